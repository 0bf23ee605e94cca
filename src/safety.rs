//! Sensor supervision
//!
//! Both climate sensors may drop individual samples. A single miss only
//! degrades that tick (the affected actuator is held off); a run of misses
//! marks the sensor failed, which the controller treats as grounds to
//! abort an auto-tune and to flag the fault in the status snapshot.

/// Consecutive missed samples after which a sensor counts as failed.
pub const SENSOR_ERROR_THRESHOLD: u8 = 5;

/// Which sensor went quiet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorFault {
    Temperature,
    Humidity,
}

/// Sensor condition summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SensorStatus {
    /// Both sensors delivering.
    Ok,
    /// A sensor has exceeded the dropout threshold.
    Fault(SensorFault),
}

/// Tracks sample dropouts for the temperature and humidity sensors.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SensorWatch {
    missed_temperature: u8,
    missed_humidity: u8,
    last_temperature_x100: Option<i16>,
    last_humidity_x100: Option<i16>,
}

impl SensorWatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record this tick's temperature sample, `None` for a missed read.
    pub fn update_temperature(&mut self, temp_x100: Option<i16>) {
        match temp_x100 {
            Some(value) => {
                self.missed_temperature = 0;
                self.last_temperature_x100 = Some(value);
            }
            None => self.missed_temperature = self.missed_temperature.saturating_add(1),
        }
    }

    /// Record this tick's humidity sample, `None` for a missed read.
    pub fn update_humidity(&mut self, humidity_x100: Option<i16>) {
        match humidity_x100 {
            Some(value) => {
                self.missed_humidity = 0;
                self.last_humidity_x100 = Some(value);
            }
            None => self.missed_humidity = self.missed_humidity.saturating_add(1),
        }
    }

    /// Temperature sensor past the dropout threshold.
    pub fn temperature_failed(&self) -> bool {
        self.missed_temperature >= SENSOR_ERROR_THRESHOLD
    }

    /// Humidity sensor past the dropout threshold.
    pub fn humidity_failed(&self) -> bool {
        self.missed_humidity >= SENSOR_ERROR_THRESHOLD
    }

    /// First fault detected, temperature before humidity.
    pub fn check(&self) -> SensorStatus {
        if self.temperature_failed() {
            return SensorStatus::Fault(SensorFault::Temperature);
        }
        if self.humidity_failed() {
            return SensorStatus::Fault(SensorFault::Humidity);
        }
        SensorStatus::Ok
    }

    /// Last good temperature (×100). Survives dropouts, for display only;
    /// control decisions always use the live sample.
    pub fn temperature_x100(&self) -> Option<i16> {
        self.last_temperature_x100
    }

    /// Last good humidity (×100). Survives dropouts, for display only.
    pub fn humidity_x100(&self) -> Option<i16> {
        self.last_humidity_x100
    }
}
