//! Bridge configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ConfigError;

/// Configuration for one execution context's bridge.
///
/// Every field has a default, so a partial JSON document is valid:
///
/// ```
/// use value_bridge::BridgeConfig;
///
/// let config = BridgeConfig::from_json_str(r#"{ "dense_array_threshold": 64 }"#).unwrap();
/// assert_eq!(config.dense_array_threshold, 64);
/// assert_eq!(config.max_conversion_depth, BridgeConfig::default().max_conversion_depth);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Arrays without holes and shorter than this become lists; all others
    /// become maps keyed by index
    pub dense_array_threshold: usize,
    /// Maximum nesting depth accepted by host-to-persistent conversion
    pub max_conversion_depth: usize,
    /// Default age after which a rooted entry is reported by leak scans
    pub leak_age_threshold_ms: u64,
    /// Return the originally bridged host object for a mapped handle
    pub preserve_identity: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            dense_array_threshold: 10_000,
            max_conversion_depth: 512,
            leak_age_threshold_ms: 30_000,
            preserve_identity: true,
        }
    }
}

impl BridgeConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: BridgeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Checks field values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_conversion_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_conversion_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The default leak age as a duration.
    pub fn leak_age_threshold(&self) -> Duration {
        Duration::from_millis(self.leak_age_threshold_ms)
    }
}
