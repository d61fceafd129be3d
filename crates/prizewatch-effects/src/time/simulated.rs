//! Simulated time effect handler for testing

use async_trait::async_trait;
use prizewatch_core::effects::{PhysicalTimeEffects, TimeError};
use prizewatch_core::time::{secs_to_ms, PhysicalTime};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::trace;

/// Simulated time handler for testing and simulation
///
/// Time stands still until [`advance_ms`](Self::advance_ms) or
/// [`set_time_ms`](Self::set_time_ms) moves it. Pending sleeps are woken
/// whenever time moves and complete once their target has been reached.
#[derive(Debug, Clone)]
pub struct SimulatedTimeHandler {
    /// Current simulated time in milliseconds
    current_time: Arc<watch::Sender<u64>>,
}

impl SimulatedTimeHandler {
    /// Create a new simulated time handler starting at the given time
    pub fn new(start_time_ms: u64) -> Self {
        let (tx, _rx) = watch::channel(start_time_ms);
        Self {
            current_time: Arc::new(tx),
        }
    }

    /// Create a simulated time handler starting at a whole second
    pub fn at_seconds(start_secs: u64) -> Self {
        Self::new(secs_to_ms(start_secs))
    }

    /// Advance simulated time by the given duration
    pub fn advance_ms(&self, duration_ms: u64) {
        self.current_time
            .send_modify(|time| *time = time.saturating_add(duration_ms));
        trace!(now_ms = self.current_ms(), "simulated time advanced");
    }

    /// Advance simulated time by whole seconds
    pub fn advance_secs(&self, secs: u64) {
        self.advance_ms(secs_to_ms(secs));
    }

    /// Set the absolute simulated time
    pub fn set_time_ms(&self, time_ms: u64) {
        self.current_time.send_replace(time_ms);
    }

    /// Get the current simulated time
    pub fn current_ms(&self) -> u64 {
        *self.current_time.borrow()
    }
}

impl Default for SimulatedTimeHandler {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl PhysicalTimeEffects for SimulatedTimeHandler {
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        Ok(PhysicalTime::from_ms(self.current_ms()))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        let mut rx = self.current_time.subscribe();
        let target = rx.borrow_and_update().saturating_add(ms);
        loop {
            if *rx.borrow_and_update() >= target {
                return Ok(());
            }
            if rx.changed().await.is_err() {
                return Err(TimeError::ServiceUnavailable);
            }
        }
    }
}
