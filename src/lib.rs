//! Board-agnostic climate control core for an egg incubator
//!
//! This crate contains all control logic that does not depend on specific
//! hardware implementations:
//!
//! - Heater PID with relay-feedback auto-tuning (Ziegler-Nichols)
//! - Latched hysteresis control for the humidifier
//! - Incubation lifecycle (species presets, stages, day counting)
//! - Egg-turner duty-cycle scheduling with live reparameterization
//! - Sensor dropout supervision
//! - Persisted configuration types
//!
//! The application loop owns the sensors, relays, display and storage; it
//! feeds measurements and a millisecond clock into
//! [`ClimateController::tick`] and forwards the returned commands.

#![no_std]
#![deny(unsafe_code)]

pub mod climate;
pub mod config;
pub mod control;
pub mod incubation;
pub mod safety;
pub mod turner;

pub use climate::{ClimateController, ClimateStatus};
pub use control::{ControlMode, Fixed32, HysteresisController, PidController};
pub use incubation::{IncubationProfile, IncubationRun, Species, Stage};
pub use turner::EggTurner;
