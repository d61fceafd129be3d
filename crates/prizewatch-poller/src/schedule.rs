//! Refetch scheduling.
//!
//! [`RefetchSchedule`] holds the adapted polling interval per distributor; an
//! absent entry means the caller's default cadence applies. [`DeadlineQueue`]
//! orders the resulting wake-ups so the reactor only ever sleeps until the
//! earliest one.

use prizewatch_core::{secs_to_ms, DistributorId, TimeLock};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::trace;

/// Milliseconds from `now_secs` until `end_secs`, or `None` once expired.
pub fn interval_until_expiry_ms(end_secs: u64, now_secs: u64) -> Option<u64> {
    (end_secs > now_secs).then(|| secs_to_ms(end_secs - now_secs))
}

/// Per-distributor polling intervals
#[derive(Debug, Clone, Default)]
pub struct RefetchSchedule {
    intervals: HashMap<DistributorId, u64>,
}

impl RefetchSchedule {
    /// Create an empty schedule
    pub fn new() -> Self {
        Self::default()
    }

    /// Adapt `distributor`'s interval to a resolved query result.
    ///
    /// An active lock sets the interval to the time left until its expiry;
    /// no lock, or a lock that has already expired, clears it. Returns the
    /// custom interval now in effect.
    pub fn adapt(
        &mut self,
        distributor: &DistributorId,
        lock: Option<&TimeLock>,
        now_secs: u64,
    ) -> Option<u64> {
        let interval = lock.and_then(|lock| interval_until_expiry_ms(lock.end_time_seconds, now_secs));
        match interval {
            Some(interval_ms) => {
                trace!(distributor = %distributor, interval_ms, "refetch interval adapted");
                self.intervals.insert(distributor.clone(), interval_ms);
            }
            None => self.clear(distributor),
        }
        interval
    }

    /// Interval for `distributor`, falling back to `default_ms`.
    pub fn interval_ms(&self, distributor: &DistributorId, default_ms: u64) -> u64 {
        self.custom_interval_ms(distributor).unwrap_or(default_ms)
    }

    /// Adapted interval for `distributor`, if any.
    pub fn custom_interval_ms(&self, distributor: &DistributorId) -> Option<u64> {
        self.intervals.get(distributor).copied()
    }

    /// Revert `distributor` to the default cadence.
    pub fn clear(&mut self, distributor: &DistributorId) {
        self.intervals.remove(distributor);
    }

    /// Keep only the distributors for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&DistributorId) -> bool) {
        self.intervals.retain(|id, _| keep(id));
    }

    /// Number of adapted entries
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Whether every distributor uses the default cadence
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

/// A scheduled re-query.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    /// Wall time (ms) at which the re-query is due
    pub due_ms: u64,
    /// Generation of the query whose completion scheduled this deadline
    pub generation: u64,
    /// Distributor to re-query
    pub distributor: DistributorId,
}

/// Min-heap of re-query deadlines with lazy invalidation.
///
/// Deadlines are never removed eagerly. A deadline is live only while the
/// caller's `is_live` predicate accepts its distributor and generation;
/// dead entries are dropped as they reach the front of the queue.
#[derive(Debug, Default)]
pub struct DeadlineQueue {
    heap: BinaryHeap<Reverse<Deadline>>,
}

impl DeadlineQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `distributor` for `due_ms`.
    pub fn push(&mut self, due_ms: u64, distributor: DistributorId, generation: u64) {
        self.heap.push(Reverse(Deadline {
            due_ms,
            generation,
            distributor,
        }));
    }

    /// Earliest live deadline, discarding dead ones on the way.
    pub fn next_due_ms(&mut self, is_live: impl Fn(&DistributorId, u64) -> bool) -> Option<u64> {
        while let Some(Reverse(head)) = self.heap.peek() {
            if is_live(&head.distributor, head.generation) {
                return Some(head.due_ms);
            }
            self.heap.pop();
        }
        None
    }

    /// Remove and return every live deadline due at or before `now_ms`.
    pub fn pop_due(
        &mut self,
        now_ms: u64,
        is_live: impl Fn(&DistributorId, u64) -> bool,
    ) -> Vec<DistributorId> {
        let mut due = Vec::new();
        while let Some(Reverse(head)) = self.heap.peek() {
            if head.due_ms > now_ms {
                break;
            }
            if let Some(Reverse(deadline)) = self.heap.pop() {
                if is_live(&deadline.distributor, deadline.generation)
                    && !due.contains(&deadline.distributor)
                {
                    due.push(deadline.distributor);
                }
            }
        }
        due
    }

    /// Number of queued deadlines, dead ones included
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
