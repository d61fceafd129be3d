//! Wall-clock time values and conversions.
//!
//! Every now-versus-expiry comparison in the workspace operates on whole
//! seconds obtained by flooring milliseconds. Under flooring,
//! `end <= ms_to_secs(now_ms)` holds exactly when `now_ms >= end * 1000`, so
//! a lock is never considered expired before its expiry second has begun.

use serde::{Deserialize, Serialize};

/// Physical wall-clock timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PhysicalTime {
    /// Milliseconds since the UNIX epoch.
    pub ts_ms: u64,
}

impl PhysicalTime {
    /// Timestamp from milliseconds since the UNIX epoch.
    pub fn from_ms(ts_ms: u64) -> Self {
        Self { ts_ms }
    }

    /// Whole seconds since the UNIX epoch (floored).
    pub fn unix_seconds(self) -> u64 {
        ms_to_secs(self.ts_ms)
    }
}

/// Milliseconds to whole seconds, flooring.
pub fn ms_to_secs(ms: u64) -> u64 {
    ms / 1000
}

/// Seconds to milliseconds, saturating at `u64::MAX`.
pub fn secs_to_ms(secs: u64) -> u64 {
    secs.saturating_mul(1000)
}
