//! Domain types for draw-lock tracking.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a draw.
pub type DrawId = u32;

/// Stable identifier of a prize distributor, unique within the active set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DistributorId(String);

impl DistributorId {
    /// Create an identifier from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DistributorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DistributorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for DistributorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier of the current draw period, keyed by the beacon's start time.
///
/// Only ever compared for equality: a new value means a new draw cycle has
/// begun and every memoized lock result is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawPeriodId(u64);

impl DrawPeriodId {
    /// Build a period identifier from the beacon period's start (seconds).
    pub fn from_started_at(started_at_seconds: u64) -> Self {
        Self(started_at_seconds)
    }

    /// Start of the period in seconds since the UNIX epoch.
    pub fn started_at_seconds(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DrawPeriodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "period@{}", self.0)
    }
}

/// Time-lock as reported by a distributor, before validation.
///
/// `end_time_seconds` is `None` when the chain client could not decode the
/// field into an integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTimelock {
    /// Lock expiry in seconds since the UNIX epoch, if decodable.
    pub end_time_seconds: Option<u64>,
    /// Draw the lock pertains to.
    pub draw_id: DrawId,
}

impl RawTimelock {
    /// A well-formed lock.
    pub fn new(end_time_seconds: u64, draw_id: DrawId) -> Self {
        Self {
            end_time_seconds: Some(end_time_seconds),
            draw_id,
        }
    }
}

/// Validated, still-active time-lock for one distributor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLock {
    /// Distributor that owns this lock.
    pub distributor_id: DistributorId,
    /// Exclusive expiry in seconds since the UNIX epoch, buffer included.
    pub end_time_seconds: u64,
    /// Draw the lock pertains to.
    pub draw_id: DrawId,
}

impl TimeLock {
    /// Whether the lock is still active at `now_secs`.
    pub fn is_active_at(&self, now_secs: u64) -> bool {
        self.end_time_seconds > now_secs
    }
}

/// Per-distributor lock state exposed to presentation layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LockStatus {
    /// No query has resolved yet.
    Loading,
    /// The distributor holds no active lock.
    Unlocked,
    /// The distributor is locked until `end_time_seconds`.
    Locked {
        /// Exclusive expiry in seconds since the UNIX epoch.
        end_time_seconds: u64,
        /// Draw the lock pertains to.
        draw_id: DrawId,
    },
    /// The last query failed.
    Failed {
        /// Human-readable failure description.
        reason: String,
    },
}

impl LockStatus {
    /// Status for a resolved query result.
    pub fn from_lock(lock: Option<&TimeLock>) -> Self {
        match lock {
            Some(lock) => Self::Locked {
                end_time_seconds: lock.end_time_seconds,
                draw_id: lock.draw_id,
            },
            None => Self::Unlocked,
        }
    }

    /// Whether the status reports an active lock.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Locked { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_expiry_is_exclusive() {
        let lock = TimeLock {
            distributor_id: "A".into(),
            end_time_seconds: 100,
            draw_id: 1,
        };
        assert!(lock.is_active_at(99));
        assert!(!lock.is_active_at(100));
        assert!(!lock.is_active_at(101));
    }

    #[test]
    fn status_serializes_with_state_tag() {
        let status = LockStatus::Locked {
            end_time_seconds: 42,
            draw_id: 7,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["state"], "locked");
        assert_eq!(json["draw_id"], 7);

        let json = serde_json::to_value(LockStatus::Unlocked).unwrap();
        assert_eq!(json["state"], "unlocked");
    }

    #[test]
    fn distributor_ids_order_lexically() {
        let mut ids = vec![DistributorId::new("b"), DistributorId::new("a")];
        ids.sort();
        assert_eq!(ids[0].as_str(), "a");
    }
}
