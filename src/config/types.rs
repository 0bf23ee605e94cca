//! Persisted configuration types
//!
//! Everything the operator can change survives a power cycle: gains and
//! setpoints, the hysteresis band, turner intervals, the species selection
//! and the clock of a running incubation. Stored as postcard binary with a
//! magic word and version byte up front.

use crate::incubation::{IncubationProfile, Species};
use crate::turner::{DEFAULT_RUN_SECONDS, DEFAULT_WAIT_MINUTES};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Magic number identifying a climate config blob.
pub const CONFIG_MAGIC: u32 = 0x494E_4355; // "INCU"

/// Current config format version.
pub const CONFIG_VERSION: u8 = 1;

/// Heater loop settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PidSettings {
    /// Proportional gain (value × 1000).
    pub kp_x1000: i32,
    /// Integral gain (value × 1000).
    pub ki_x1000: i32,
    /// Derivative gain (value × 1000).
    pub kd_x1000: i32,
    /// Temperature setpoint (×100).
    pub setpoint_x100: i16,
}

impl Default for PidSettings {
    fn default() -> Self {
        Self {
            kp_x1000: 10_000,
            ki_x1000: 100,
            kd_x1000: 5_000,
            setpoint_x100: 3_750,
        }
    }
}

/// Humidifier band settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HysteresisSettings {
    /// Humidity setpoint (×100).
    pub setpoint_x100: i16,
    /// Band extent below the setpoint (×100).
    pub low_threshold_x100: i16,
    /// Band extent above the setpoint (×100).
    pub high_threshold_x100: i16,
}

impl Default for HysteresisSettings {
    fn default() -> Self {
        Self {
            setpoint_x100: 6_000,
            low_threshold_x100: 500,
            high_threshold_x100: 200,
        }
    }
}

/// Egg turner intervals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TurnerSettings {
    /// Rest between turns (minutes).
    pub wait_minutes: u16,
    /// Length of one turn (seconds).
    pub run_seconds: u16,
}

impl Default for TurnerSettings {
    fn default() -> Self {
        Self {
            wait_minutes: DEFAULT_WAIT_MINUTES,
            run_seconds: DEFAULT_RUN_SECONDS,
        }
    }
}

/// Incubation selection and run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IncubationSettings {
    /// Selected species.
    pub species: Species,
    /// Operator-edited manual profile.
    pub manual_profile: IncubationProfile,
    /// A run was active when this config was saved.
    pub running: bool,
    /// Start timestamp of that run, on the same clock as `tick`.
    pub started_at_ms: u64,
}

/// Complete persisted configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClimateConfig {
    /// Magic word for validation.
    pub magic: u32,
    /// Data format version.
    pub version: u8,
    pub pid: PidSettings,
    pub hysteresis: HysteresisSettings,
    pub turner: TurnerSettings,
    pub incubation: IncubationSettings,
}

impl Default for ClimateConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl ClimateConfig {
    /// Factory defaults with a valid header.
    pub fn new() -> Self {
        Self {
            magic: CONFIG_MAGIC,
            version: CONFIG_VERSION,
            pid: PidSettings::default(),
            hysteresis: HysteresisSettings::default(),
            turner: TurnerSettings::default(),
            incubation: IncubationSettings::default(),
        }
    }

    /// Magic and version match this build.
    pub fn is_valid(&self) -> bool {
        self.magic == CONFIG_MAGIC && self.version == CONFIG_VERSION
    }
}
