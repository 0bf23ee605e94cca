//! Configuration
//!
//! Shared parameter limits, the persisted configuration types, and the
//! postcard encoding used to store them.

pub mod limits;
#[cfg(feature = "serde")]
pub mod persist;
pub mod types;

#[cfg(feature = "serde")]
pub use persist::{from_bytes, to_bytes, ConfigError, MAX_CONFIG_SIZE};
pub use types::*;
