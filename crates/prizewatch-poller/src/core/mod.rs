//! Poller foundation: config, errors, metrics.

pub mod config;
pub mod errors;
pub mod metrics;

pub use config::{PollerConfig, DEFAULT_REFETCH_INTERVAL_MS};
pub use errors::{ConfigError, PollError, PollResult, ServiceError};
pub use metrics::{PollerMetrics, PollerMetricsSnapshot};
