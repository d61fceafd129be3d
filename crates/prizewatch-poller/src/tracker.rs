//! Per-distributor bookkeeping.
//!
//! The tracker is the only owner of the refetch schedule. It is synchronous
//! and knows nothing about futures: the reactor tells it when a query starts
//! and hands it each completion, and the tracker decides whether that
//! completion is still wanted.
//!
//! Every query gets a generation drawn from a single counter. A completion
//! is applied only if its distributor is still active and its generation is
//! the distributor's current one, so a removed distributor (or one whose
//! query was superseded by a draw-period change) can never write an interval.

use crate::core::PollResult;
use crate::schedule::{DeadlineQueue, RefetchSchedule};
use prizewatch_core::{ms_to_secs, DistributorId, LockStatus, TimeLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Presentation view of one distributor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributorView {
    /// Latest lock status
    pub status: LockStatus,
    /// Interval currently used between queries
    pub refetch_interval_ms: u64,
    /// Whether the interval was adapted to a lock expiry
    pub adapted: bool,
}

/// Result of applying a completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The completion was current and the schedule was updated
    Applied {
        /// Status recorded for the distributor
        status: LockStatus,
        /// Lock still active at completion time, if any
        lock: Option<TimeLock>,
        /// Milliseconds until the next scheduled query
        next_poll_ms: u64,
    },
    /// The distributor is gone or the query was superseded
    Stale,
}

/// Membership change produced by [`DistributorTracker::sync_members`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Membership {
    /// Distributors that joined
    pub added: Vec<DistributorId>,
    /// Distributors that left
    pub removed: Vec<DistributorId>,
}

#[derive(Debug)]
struct Entry {
    generation: u64,
    in_flight: bool,
    status: LockStatus,
}

/// Active set, schedule and deadlines for the reactor
#[derive(Debug)]
pub struct DistributorTracker {
    entries: BTreeMap<DistributorId, Entry>,
    schedule: RefetchSchedule,
    deadlines: DeadlineQueue,
    next_generation: u64,
    default_interval_ms: u64,
}

impl DistributorTracker {
    /// Create an empty tracker using `default_interval_ms` when no lock is known
    pub fn new(default_interval_ms: u64) -> Self {
        Self {
            entries: BTreeMap::new(),
            schedule: RefetchSchedule::new(),
            deadlines: DeadlineQueue::new(),
            next_generation: 0,
            default_interval_ms,
        }
    }

    /// Replace the active set.
    ///
    /// New distributors start in [`LockStatus::Loading`]; removed ones lose
    /// their status and schedule entry, and their deadlines go dead.
    pub fn sync_members(&mut self, ids: &[DistributorId]) -> Membership {
        let wanted: BTreeSet<&DistributorId> = ids.iter().collect();

        let removed: Vec<DistributorId> = self
            .entries
            .keys()
            .filter(|id| !wanted.contains(id))
            .cloned()
            .collect();
        for id in &removed {
            self.entries.remove(id);
            self.schedule.clear(id);
        }

        let mut added = Vec::new();
        for id in wanted {
            if !self.entries.contains_key(id) {
                self.entries.insert(
                    id.clone(),
                    Entry {
                        generation: 0,
                        in_flight: false,
                        status: LockStatus::Loading,
                    },
                );
                added.push(id.clone());
            }
        }

        Membership { added, removed }
    }

    /// Whether `id` is in the active set
    pub fn contains(&self, id: &DistributorId) -> bool {
        self.entries.contains_key(id)
    }

    /// Active distributor ids, ordered
    pub fn ids(&self) -> Vec<DistributorId> {
        self.entries.keys().cloned().collect()
    }

    /// Start a query for `id`, superseding any query in flight.
    ///
    /// With `invalidate` set the previous result no longer applies: the status
    /// goes back to [`LockStatus::Loading`] and any adapted interval is dropped
    /// until the new query resolves.
    ///
    /// Returns the new generation, or `None` if `id` is not active.
    pub fn begin_query(&mut self, id: &DistributorId, invalidate: bool) -> Option<u64> {
        let entry = self.entries.get_mut(id)?;
        self.next_generation += 1;
        entry.generation = self.next_generation;
        entry.in_flight = true;
        if invalidate {
            entry.status = LockStatus::Loading;
            self.schedule.clear(id);
        }
        Some(entry.generation)
    }

    /// Apply a completed query.
    pub fn complete(
        &mut self,
        id: &DistributorId,
        generation: u64,
        result: &PollResult<Option<TimeLock>>,
        now_ms: u64,
    ) -> Completion {
        let Some(entry) = self.entries.get_mut(id) else {
            return Completion::Stale;
        };
        if entry.generation != generation {
            return Completion::Stale;
        }
        entry.in_flight = false;

        let now_secs = ms_to_secs(now_ms);
        let (status, lock) = match result {
            Ok(lock) => {
                let lock = lock.as_ref().filter(|lock| lock.is_active_at(now_secs));
                self.schedule.adapt(id, lock, now_secs);
                (LockStatus::from_lock(lock), lock.cloned())
            }
            Err(err) => {
                self.schedule.clear(id);
                (
                    LockStatus::Failed {
                        reason: err.to_string(),
                    },
                    None,
                )
            }
        };
        entry.status = status.clone();

        let next_poll_ms = self.schedule.interval_ms(id, self.default_interval_ms);
        self.deadlines
            .push(now_ms.saturating_add(next_poll_ms), id.clone(), generation);

        Completion::Applied {
            status,
            lock,
            next_poll_ms,
        }
    }

    /// Distributors whose interval elapsed by `now_ms` and have nothing in flight
    pub fn pop_due(&mut self, now_ms: u64) -> Vec<DistributorId> {
        let entries = &self.entries;
        self.deadlines
            .pop_due(now_ms, |id, generation| Self::is_live(entries, id, generation))
    }

    /// Earliest pending deadline
    pub fn next_deadline_ms(&mut self) -> Option<u64> {
        let entries = &self.entries;
        self.deadlines
            .next_due_ms(|id, generation| Self::is_live(entries, id, generation))
    }

    /// Latest status for `id`
    pub fn status(&self, id: &DistributorId) -> Option<&LockStatus> {
        self.entries.get(id).map(|entry| &entry.status)
    }

    /// The refetch schedule
    pub fn schedule(&self) -> &RefetchSchedule {
        &self.schedule
    }

    /// Presentation view of every active distributor
    pub fn snapshot(&self) -> BTreeMap<DistributorId, DistributorView> {
        self.entries
            .iter()
            .map(|(id, entry)| {
                let custom = self.schedule.custom_interval_ms(id);
                (
                    id.clone(),
                    DistributorView {
                        status: entry.status.clone(),
                        refetch_interval_ms: custom.unwrap_or(self.default_interval_ms),
                        adapted: custom.is_some(),
                    },
                )
            })
            .collect()
    }

    fn is_live(entries: &BTreeMap<DistributorId, Entry>, id: &DistributorId, generation: u64) -> bool {
        entries
            .get(id)
            .is_some_and(|entry| entry.generation == generation && !entry.in_flight)
    }
}
