//! CLI configuration file.

use prizewatch_core::DrawId;
use prizewatch_poller::{ConfigError, PollerConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Errors raised while loading `prizewatch.toml`
#[derive(Debug, Error)]
pub enum CliConfigError {
    /// The file exists but could not be read
    #[error("failed to read config file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// Poller settings were rejected
    #[error(transparent)]
    Poller(#[from] ConfigError),

    /// A fixture entry is unusable
    #[error("invalid distributor fixture: {reason}")]
    Fixture { reason: String },
}

/// A distributor simulated by the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSpec {
    /// Distributor identifier
    pub id: String,
    /// Seconds from start-up until the lock ends; absent means unlocked
    #[serde(default)]
    pub lock_in_secs: Option<u64>,
    /// Draw the lock pertains to
    #[serde(default = "default_draw_id")]
    pub draw_id: DrawId,
    /// When set, every query fails with this reason
    #[serde(default)]
    pub fail: Option<String>,
}

fn default_draw_id() -> DrawId {
    1
}

/// Top-level `prizewatch.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Poller tuning
    pub poller: PollerConfig,
    /// Start of the draw period in seconds; defaults to start-up time
    pub draw_period_started_at: Option<u64>,
    /// Distributors to watch
    pub distributors: Vec<FixtureSpec>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            poller: PollerConfig::default(),
            draw_period_started_at: None,
            distributors: vec![
                FixtureSpec {
                    id: "alpha".to_string(),
                    lock_in_secs: Some(30),
                    draw_id: 12,
                    fail: None,
                },
                FixtureSpec {
                    id: "beta".to_string(),
                    lock_in_secs: None,
                    draw_id: 12,
                    fail: None,
                },
                FixtureSpec {
                    id: "gamma".to_string(),
                    lock_in_secs: None,
                    draw_id: 12,
                    fail: Some("rpc endpoint unreachable".to_string()),
                },
            ],
        }
    }
}

impl CliConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str, path: &Path) -> Result<Self, CliConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| CliConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, falling back to the built-in fixtures when it is absent.
    pub fn load(path: &Path) -> Result<Self, CliConfigError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "config file not found, using built-in fixtures");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(CliConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Self::from_toml_str(&raw, path)
    }

    /// Reject empty or repeated fixture ids and invalid poller settings.
    pub fn validate(&self) -> Result<(), CliConfigError> {
        self.poller.validate()?;

        let mut seen = HashSet::new();
        for spec in &self.distributors {
            if spec.id.trim().is_empty() {
                return Err(CliConfigError::Fixture {
                    reason: "distributor id must not be empty".to_string(),
                });
            }
            if !seen.insert(spec.id.as_str()) {
                return Err(CliConfigError::Fixture {
                    reason: format!("distributor id {} listed twice", spec.id),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_uses_builtin_fixtures() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig::load(&dir.path().join("prizewatch.toml")).unwrap();
        assert_eq!(config, CliConfig::default());
        assert_eq!(config.distributors.len(), 3);
    }

    #[test]
    fn unreadable_path_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = CliConfig::load(dir.path()).unwrap_err();
        assert!(matches!(err, CliConfigError::Io { .. }));
    }

    #[test]
    fn reads_poller_section_and_fixtures() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
draw_period_started_at = 1700000000

[poller]
default_interval_ms = 60000

[[distributors]]
id = "pool"
lock_in_secs = 90
draw_id = 4

[[distributors]]
id = "broken"
fail = "reverted"
"#
        )
        .unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.poller.default_interval_ms, 60_000);
        assert_eq!(config.poller.expiry_buffer_secs, 1);
        assert_eq!(config.draw_period_started_at, Some(1_700_000_000));
        assert_eq!(config.distributors[0].lock_in_secs, Some(90));
        assert_eq!(config.distributors[1].draw_id, 1);
        assert_eq!(config.distributors[1].fail.as_deref(), Some("reverted"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let raw = "[[distributors]]\nid = \"a\"\n[[distributors]]\nid = \"a\"\n";
        let err = CliConfig::from_toml_str(raw, Path::new("dup.toml")).unwrap_err();
        assert!(matches!(err, CliConfigError::Fixture { .. }));
    }

    #[test]
    fn invalid_poller_settings_are_rejected() {
        let raw = "[poller]\nevent_capacity = 0\n";
        let err = CliConfig::from_toml_str(raw, Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, CliConfigError::Poller(ConfigError::Invalid { .. })));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = CliConfig::from_toml_str("distributors = 3", Path::new("x.toml")).unwrap_err();
        assert!(err.to_string().contains("x.toml"));
    }
}
