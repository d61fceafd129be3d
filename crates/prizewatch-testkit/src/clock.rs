//! Clock that can be told to fail.

use async_trait::async_trait;
use prizewatch_core::{PhysicalTime, PhysicalTimeEffects, TimeError};
use prizewatch_effects::SimulatedTimeHandler;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Simulated clock whose wall-time reads fail while [`set_failing`](Self::set_failing) is on.
///
/// Sleeps keep following the inner clock either way.
#[derive(Debug)]
pub struct FlakyClock {
    inner: SimulatedTimeHandler,
    failing: AtomicBool,
}

impl FlakyClock {
    /// Working clock at `secs` seconds since the UNIX epoch.
    pub fn at_seconds(secs: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: SimulatedTimeHandler::at_seconds(secs),
            failing: AtomicBool::new(false),
        })
    }

    /// Make `physical_time` fail (or recover).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The underlying simulated clock.
    pub fn sim(&self) -> &SimulatedTimeHandler {
        &self.inner
    }
}

#[async_trait]
impl PhysicalTimeEffects for FlakyClock {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(TimeError::ServiceUnavailable);
        }
        self.inner.physical_time().await
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        self.inner.sleep_ms(ms).await
    }
}
