//! Species presets
//!
//! Temperature and humidity targets differ between the development and
//! hatching stages; the built-in presets carry the usual values for the
//! three supported birds, and `Manual` points at an operator-edited
//! profile stored on the run.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Selectable egg type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Species {
    #[default]
    Chicken,
    Quail,
    Goose,
    /// Operator-editable profile.
    Manual,
}

/// Stage targets and timing for one species.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IncubationProfile {
    /// Development-stage temperature target (×100).
    pub development_temp_x100: i16,
    /// Hatching-stage temperature target (×100).
    pub hatching_temp_x100: i16,
    /// Development-stage relative humidity target (×100).
    pub development_humidity_x100: i16,
    /// Hatching-stage relative humidity target (×100).
    pub hatching_humidity_x100: i16,
    /// Days spent in the development stage.
    pub development_days: u16,
    /// Days spent in the hatching stage.
    pub hatching_days: u16,
}

impl IncubationProfile {
    pub const fn total_days(&self) -> u16 {
        self.development_days.saturating_add(self.hatching_days)
    }
}

impl Default for IncubationProfile {
    /// Starting point for the manual profile.
    fn default() -> Self {
        Self {
            development_temp_x100: 3_750,
            hatching_temp_x100: 3_700,
            development_humidity_x100: 6_000,
            hatching_humidity_x100: 7_000,
            development_days: 18,
            hatching_days: 3,
        }
    }
}

impl Species {
    /// Built-in targets. `Manual` has none; the run substitutes its stored
    /// profile.
    pub const fn preset(&self) -> Option<IncubationProfile> {
        match self {
            Species::Chicken => Some(IncubationProfile {
                development_temp_x100: 3_780,
                hatching_temp_x100: 3_750,
                development_humidity_x100: 6_000,
                hatching_humidity_x100: 7_000,
                development_days: 18,
                hatching_days: 3,
            }),
            Species::Quail => Some(IncubationProfile {
                development_temp_x100: 3_750,
                hatching_temp_x100: 3_650,
                development_humidity_x100: 6_000,
                hatching_humidity_x100: 7_000,
                development_days: 15,
                hatching_days: 3,
            }),
            Species::Goose => Some(IncubationProfile {
                development_temp_x100: 3_740,
                hatching_temp_x100: 3_690,
                development_humidity_x100: 5_500,
                hatching_humidity_x100: 7_500,
                development_days: 28,
                hatching_days: 3,
            }),
            Species::Manual => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Species::Chicken => "chicken",
            Species::Quail => "quail",
            Species::Goose => "goose",
            Species::Manual => "manual",
        }
    }
}
