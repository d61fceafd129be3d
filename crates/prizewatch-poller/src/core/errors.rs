//! Error types for the draw-lock poller.
//!
//! Every [`PollError`] is scoped to the distributor that produced it; the
//! poller has no global failure mode.

use prizewatch_core::{DistributorError, DistributorId, TimeError};
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for lock queries.
pub type PollResult<T> = Result<T, PollError>;

/// Failure of a single distributor's lock query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// The distributor's query rejected
    #[error("Query for {distributor} failed: {source}")]
    Query {
        /// Distributor that was queried
        distributor: DistributorId,
        /// Underlying failure
        #[source]
        source: DistributorError,
    },

    /// The distributor answered with lock data that cannot be used
    #[error("Malformed lock data from {distributor}: {reason}")]
    MalformedLock {
        /// Distributor that answered
        distributor: DistributorId,
        /// What was wrong with the data
        reason: String,
    },

    /// The query did not resolve within the configured timeout
    #[error("Query for {distributor} timed out after {timeout_ms}ms")]
    Timeout {
        /// Distributor that was queried
        distributor: DistributorId,
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Wall time could not be read
    #[error("Clock unavailable: {source}")]
    Clock {
        /// Underlying clock failure
        #[from]
        source: TimeError,
    },
}

impl PollError {
    /// Distributor the failure belongs to, when known.
    pub fn distributor(&self) -> Option<&DistributorId> {
        match self {
            Self::Query { distributor, .. }
            | Self::MalformedLock { distributor, .. }
            | Self::Timeout { distributor, .. } => Some(distributor),
            Self::Clock { .. } => None,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("Invalid configuration: {reason}")]
    Invalid {
        /// The reason the configuration is invalid
        reason: String,
    },
}

/// Errors returned by the poller handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    /// The reactor has been shut down
    #[error("Draw-lock poller has been shut down")]
    Stopped,
}
