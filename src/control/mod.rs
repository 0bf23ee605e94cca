//! Control loops
//!
//! Fixed-point PID with relay-feedback auto-tuning for the heater, and a
//! latched hysteresis band for the humidifier.

pub mod autotune;
pub mod fixed;
pub mod hysteresis;
pub mod pid;

pub use autotune::{Autotuner, TunePhase, TuneResult};
pub use fixed::Fixed32;
pub use hysteresis::HysteresisController;
pub use pid::{ControlMode, PidController, PidGains};
