//! Real time effect handler for production use

use async_trait::async_trait;
use prizewatch_core::effects::{PhysicalTimeEffects, TimeError};
use prizewatch_core::time::PhysicalTime;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time;

/// Real time handler for production use
///
/// Stateless; wall time comes from `SystemTime` and sleeps from the Tokio timer.
#[derive(Debug, Clone, Default)]
pub struct RealTimeHandler;

impl RealTimeHandler {
    /// Create a new real time handler
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PhysicalTimeEffects for RealTimeHandler {
    #[allow(clippy::disallowed_methods)]
    async fn physical_time(&self) -> Result<PhysicalTime, TimeError> {
        let elapsed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| TimeError::OperationFailed {
                reason: format!("system clock before UNIX epoch: {e}"),
            })?;
        let ts_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        Ok(PhysicalTime::from_ms(ts_ms))
    }

    async fn sleep_ms(&self, ms: u64) -> Result<(), TimeError> {
        time::sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_physical_time_is_after_2020() {
        let handler = RealTimeHandler::new();
        let now = handler.physical_time().await.unwrap();
        // 2020-01-01T00:00:00Z
        assert!(now.unix_seconds() > 1_577_836_800);
    }

    #[tokio::test]
    async fn test_zero_sleep_returns() {
        let handler = RealTimeHandler::new();
        assert!(handler.sleep_ms(0).await.is_ok());
    }
}
