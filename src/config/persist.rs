//! Config blob encoding
//!
//! postcard on the wire. The magic word and version are validated before
//! any field of a decoded blob is trusted.

use heapless::Vec;

use super::types::{ClimateConfig, CONFIG_MAGIC, CONFIG_VERSION};

/// Upper bound on an encoded config blob.
pub const MAX_CONFIG_SIZE: usize = 128;

/// Why a config blob failed to encode or decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Encoded config did not fit the destination buffer.
    BufferTooSmall,
    /// Blob did not decode as a config.
    Deserialize,
    /// Magic word mismatch; not a config blob.
    BadMagic,
    /// Config format this build does not understand.
    VersionMismatch,
}

/// Encode a config for storage.
pub fn to_bytes(config: &ClimateConfig) -> Result<Vec<u8, MAX_CONFIG_SIZE>, ConfigError> {
    postcard::to_vec(config).map_err(|_| ConfigError::BufferTooSmall)
}

/// Decode and validate a stored blob.
pub fn from_bytes(bytes: &[u8]) -> Result<ClimateConfig, ConfigError> {
    let config: ClimateConfig =
        postcard::from_bytes(bytes).map_err(|_| ConfigError::Deserialize)?;
    if config.magic != CONFIG_MAGIC {
        return Err(ConfigError::BadMagic);
    }
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::VersionMismatch);
    }
    Ok(config)
}
