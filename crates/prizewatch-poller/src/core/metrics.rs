//! Poller counters.
//!
//! Counters are shared between the reactor and its handle, so they are plain
//! atomics read through [`PollerMetrics::snapshot`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Operational counters for the draw-lock poller
#[derive(Debug, Default)]
pub struct PollerMetrics {
    queries_issued: AtomicU64,
    queries_succeeded: AtomicU64,
    queries_failed: AtomicU64,
    stale_discarded: AtomicU64,
    locks_observed: AtomicU64,
}

/// Point-in-time copy of [`PollerMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerMetricsSnapshot {
    /// Total queries sent to distributors
    pub queries_issued: u64,
    /// Queries that resolved with usable data (locked or not)
    pub queries_succeeded: u64,
    /// Queries that failed, timed out or returned malformed data
    pub queries_failed: u64,
    /// Completions dropped because their distributor or generation was gone
    pub stale_discarded: u64,
    /// Successful queries that reported an active lock
    pub locks_observed: u64,
}

impl PollerMetrics {
    /// Create zeroed counters
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a query being sent
    pub fn record_issued(&self) {
        self.queries_issued.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful resolution
    pub fn record_success(&self, locked: bool) {
        self.queries_succeeded.fetch_add(1, Ordering::Relaxed);
        if locked {
            self.locks_observed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a failed resolution
    pub fn record_failure(&self) {
        self.queries_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a discarded stale completion
    pub fn record_stale(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> PollerMetricsSnapshot {
        PollerMetricsSnapshot {
            queries_issued: self.queries_issued.load(Ordering::Relaxed),
            queries_succeeded: self.queries_succeeded.load(Ordering::Relaxed),
            queries_failed: self.queries_failed.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            locks_observed: self.locks_observed.load(Ordering::Relaxed),
        }
    }
}
