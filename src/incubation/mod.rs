//! Incubation lifecycle
//!
//! Species presets and the day/stage tracking for a run.

pub mod run;
pub mod species;

pub use run::{IncubationRun, Stage};
pub use species::{IncubationProfile, Species};
