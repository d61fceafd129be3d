//! Observable poller output.
//!
//! [`PollerSnapshot`] is the presentation boundary: the latest status of every
//! active distributor. [`PollerEvent`] is a lossy stream of what the reactor
//! did, for logging, tests and diagnostics.

use crate::tracker::DistributorView;
use prizewatch_core::{DistributorId, DrawPeriodId, TimeLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Why a query was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequeryReason {
    /// The distributor joined the active set
    DistributorAdded,
    /// A new draw period began (or the first one became known)
    DrawPeriodChanged,
    /// The distributor's refetch interval elapsed
    IntervalElapsed,
    /// A caller requested a refresh
    Manual,
}

/// Reactor activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PollerEvent {
    /// A query was sent to a distributor
    QueryIssued {
        /// Distributor queried
        distributor: DistributorId,
        /// What triggered the query
        reason: RequeryReason,
    },
    /// A query resolved and the schedule was updated
    LockResolved {
        /// Distributor queried
        distributor: DistributorId,
        /// Active lock, if any
        lock: Option<TimeLock>,
        /// Milliseconds until the next scheduled query
        next_poll_ms: u64,
    },
    /// A query failed; the distributor falls back to the default cadence
    QueryFailed {
        /// Distributor queried
        distributor: DistributorId,
        /// Failure description
        error: String,
        /// Milliseconds until the next scheduled query
        next_poll_ms: u64,
    },
    /// A completion arrived for a removed distributor or a superseded query
    StaleCompletionDiscarded {
        /// Distributor the completion belonged to
        distributor: DistributorId,
    },
    /// A distributor left the active set
    DistributorRemoved {
        /// Distributor removed
        distributor: DistributorId,
    },
}

impl PollerEvent {
    /// Distributor the event concerns
    pub fn distributor(&self) -> &DistributorId {
        match self {
            Self::QueryIssued { distributor, .. }
            | Self::LockResolved { distributor, .. }
            | Self::QueryFailed { distributor, .. }
            | Self::StaleCompletionDiscarded { distributor }
            | Self::DistributorRemoved { distributor } => distributor,
        }
    }
}

/// Latest known state of every active distributor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerSnapshot {
    /// Current draw period, once known
    pub draw_period: Option<DrawPeriodId>,
    /// Per-distributor view, ordered by id
    pub distributors: BTreeMap<DistributorId, DistributorView>,
}

impl PollerSnapshot {
    /// View for one distributor
    pub fn get(&self, distributor: &str) -> Option<&DistributorView> {
        self.distributors.get(&DistributorId::new(distributor))
    }
}
