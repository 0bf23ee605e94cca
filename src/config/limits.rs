//! Operator-settable parameter ranges
//!
//! Shared between the live setters and the persisted-config validation so
//! a stored snapshot can never smuggle in a value the UI would reject.

use crate::control::fixed::Fixed32;

/// Gain clamps applied to auto-tune results and persisted gains.
pub const KP_MIN: Fixed32 = Fixed32::from_scaled_100(10);
pub const KP_MAX: Fixed32 = Fixed32::from_int(100);
pub const KI_MIN: Fixed32 = Fixed32::from_scaled_100(1);
pub const KI_MAX: Fixed32 = Fixed32::from_int(10);
pub const KD_MIN: Fixed32 = Fixed32::from_scaled_100(10);
pub const KD_MAX: Fixed32 = Fixed32::from_int(100);

/// Heater setpoint bounds (×100).
pub const TEMPERATURE_SETPOINT_MIN_X100: i16 = 0;
pub const TEMPERATURE_SETPOINT_MAX_X100: i16 = 5_000;

/// Humidifier setpoint bounds (×100).
pub const HUMIDITY_SETPOINT_MIN_X100: i16 = 3_000;
pub const HUMIDITY_SETPOINT_MAX_X100: i16 = 9_000;

/// Hysteresis threshold bounds (×100).
pub const HYSTERESIS_THRESHOLD_MIN_X100: i16 = 0;
pub const HYSTERESIS_THRESHOLD_MAX_X100: i16 = 2_000;

/// Egg turner interval bounds.
pub const TURN_WAIT_MIN_MINUTES: u16 = 1;
pub const TURN_WAIT_MAX_MINUTES: u16 = 240;
pub const TURN_RUN_MIN_SECONDS: u16 = 1;
pub const TURN_RUN_MAX_SECONDS: u16 = 60;

pub const fn valid_temperature_setpoint(value_x100: i16) -> bool {
    value_x100 >= TEMPERATURE_SETPOINT_MIN_X100 && value_x100 <= TEMPERATURE_SETPOINT_MAX_X100
}

pub const fn valid_humidity_setpoint(value_x100: i16) -> bool {
    value_x100 >= HUMIDITY_SETPOINT_MIN_X100 && value_x100 <= HUMIDITY_SETPOINT_MAX_X100
}

pub const fn valid_hysteresis_threshold(value_x100: i16) -> bool {
    value_x100 >= HYSTERESIS_THRESHOLD_MIN_X100 && value_x100 <= HYSTERESIS_THRESHOLD_MAX_X100
}

pub const fn valid_turn_wait(minutes: u16) -> bool {
    minutes >= TURN_WAIT_MIN_MINUTES && minutes <= TURN_WAIT_MAX_MINUTES
}

pub const fn valid_turn_run(seconds: u16) -> bool {
    seconds >= TURN_RUN_MIN_SECONDS && seconds <= TURN_RUN_MAX_SECONDS
}
