//! Poller configuration.

use super::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default polling cadence when no lock expiry is known (2.5 minutes).
pub const DEFAULT_REFETCH_INTERVAL_MS: u64 = 150_000;

/// Configuration for the draw-lock poller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerConfig {
    /// Interval between queries for a distributor with no known lock expiry
    pub default_interval_ms: u64,
    /// Seconds added to a reported lock expiry before it is surfaced
    pub expiry_buffer_secs: u64,
    /// Per-query timeout; `0` disables it
    pub query_timeout_ms: u64,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: DEFAULT_REFETCH_INTERVAL_MS,
            expiry_buffer_secs: 1,
            query_timeout_ms: 30_000,
            event_capacity: 256,
        }
    }
}

impl PollerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Reject values the reactor cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                reason: "default_interval_ms must be greater than zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                reason: "event_capacity must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Query timeout, if enabled.
    pub fn query_timeout(&self) -> Option<u64> {
        (self.query_timeout_ms > 0).then_some(self.query_timeout_ms)
    }
}
