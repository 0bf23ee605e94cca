//! Incubation lifecycle
//!
//! Tracks one incubation run: when it started, which day it is on, which
//! stage that day falls in, and whether the expected hatch date has passed.
//! Completion is advisory; the climate stays under control until the
//! operator stops the run.

use super::species::{IncubationProfile, Species};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One incubation day, measured in run time.
const DAY_MS: u64 = 86_400_000;

/// Lifecycle stage. Day counts beyond the development period fall in
/// `Hatching`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Stage {
    #[default]
    Development,
    Hatching,
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Development => "development",
            Stage::Hatching => "hatching",
        }
    }
}

/// State of the current incubation run.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IncubationRun {
    species: Species,
    manual_profile: IncubationProfile,
    running: bool,
    completed: bool,
    started_at_ms: u64,
    stage: Stage,
}

impl IncubationRun {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// True once the run has outlived its expected total days. Advisory:
    /// the run keeps going until [`stop`] is called.
    ///
    /// [`stop`]: Self::stop
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn started_at_ms(&self) -> u64 {
        self.started_at_ms
    }

    pub fn manual_profile(&self) -> IncubationProfile {
        self.manual_profile
    }

    /// Targets in force: the species preset, or the stored manual profile.
    pub fn active_profile(&self) -> IncubationProfile {
        self.species.preset().unwrap_or(self.manual_profile)
    }

    /// Switch species. Allowed mid-run; the new targets apply from the next
    /// update. Clears the completion flag since the expected duration just
    /// changed.
    pub fn set_species(&mut self, species: Species) {
        self.species = species;
        self.completed = false;
    }

    /// Replace the whole manual profile. Each stage needs at least one day.
    pub fn set_manual_profile(&mut self, profile: IncubationProfile) -> bool {
        if profile.development_days == 0 || profile.hatching_days == 0 {
            return false;
        }
        self.manual_profile = profile;
        true
    }

    /// Adjust the manual profile's temperature for the stage the run is in.
    /// Rejected unless the manual species is selected.
    pub fn set_target_temperature_x100(&mut self, value_x100: i16) -> bool {
        if self.species != Species::Manual {
            return false;
        }
        match self.stage {
            Stage::Development => self.manual_profile.development_temp_x100 = value_x100,
            Stage::Hatching => self.manual_profile.hatching_temp_x100 = value_x100,
        }
        true
    }

    /// Adjust the manual profile's humidity for the stage the run is in.
    /// Rejected unless the manual species is selected.
    pub fn set_target_humidity_x100(&mut self, value_x100: i16) -> bool {
        if self.species != Species::Manual {
            return false;
        }
        match self.stage {
            Stage::Development => self.manual_profile.development_humidity_x100 = value_x100,
            Stage::Hatching => self.manual_profile.hatching_humidity_x100 = value_x100,
        }
        true
    }

    /// Begin a run at `now_ms`. Also restarts: a running or completed run
    /// starts over from day one.
    pub fn start(&mut self, now_ms: u64) {
        self.running = true;
        self.started_at_ms = now_ms;
        self.stage = Stage::Development;
        self.completed = false;
    }

    /// End the run. Never called automatically; a completed run keeps
    /// incubating until the operator does this.
    pub fn stop(&mut self) {
        self.running = false;
        self.completed = false;
    }

    /// Resume a previously persisted run without resetting its clock.
    pub fn resume(&mut self, started_at_ms: u64, now_ms: u64) {
        self.running = true;
        self.started_at_ms = started_at_ms;
        self.completed = false;
        self.update(now_ms);
    }

    /// Day of the run, starting at 1. Zero while stopped. Keeps counting
    /// past the expected total.
    pub fn current_day(&self, now_ms: u64) -> u32 {
        if !self.running {
            return 0;
        }
        (now_ms.saturating_sub(self.started_at_ms) / DAY_MS + 1) as u32
    }

    /// Day clamped to the expected total, for display.
    pub fn display_day(&self, now_ms: u64) -> u32 {
        if !self.running {
            return 0;
        }
        self.current_day(now_ms)
            .min(self.active_profile().total_days() as u32)
    }

    /// Re-derive the stage and completion flag from the clock. The stage
    /// follows the day in both directions, so a species change mid-run
    /// moves the boundary and the stage tracks it.
    pub fn update(&mut self, now_ms: u64) {
        if !self.running {
            return;
        }
        let day = self.current_day(now_ms);
        let profile = self.active_profile();

        self.stage = if day > profile.development_days as u32 {
            Stage::Hatching
        } else {
            Stage::Development
        };
        if day > profile.total_days() as u32 {
            self.completed = true;
        }
    }

    /// Temperature target for the current stage (×100).
    pub fn target_temperature_x100(&self) -> i16 {
        let profile = self.active_profile();
        match self.stage {
            Stage::Development => profile.development_temp_x100,
            Stage::Hatching => profile.hatching_temp_x100,
        }
    }

    /// Humidity target for the current stage (×100).
    pub fn target_humidity_x100(&self) -> i16 {
        let profile = self.active_profile();
        match self.stage {
            Stage::Development => profile.development_humidity_x100,
            Stage::Hatching => profile.hatching_humidity_x100,
        }
    }
}
