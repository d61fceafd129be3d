//! Prize distributor handle.
//!
//! A distributor handle is supplied by an external discovery collaborator
//! (typically a chain client). The poller only reads from it.

use crate::types::{DistributorId, RawTimelock};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Failure reported by a distributor query.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
pub enum DistributorError {
    #[error("Network error: {reason}")]
    Network { reason: String },
    #[error("Chain call failed: {reason}")]
    Chain { reason: String },
}

impl DistributorError {
    /// Shorthand for a network failure.
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    /// Shorthand for a failed contract call.
    pub fn chain(reason: impl Into<String>) -> Self {
        Self::Chain {
            reason: reason.into(),
        }
    }
}

/// Opaque handle to one prize-distributor instance.
#[async_trait]
pub trait PrizeDistributor: Send + Sync {
    /// Stable identifier, unique within the active set.
    fn id(&self) -> DistributorId;

    /// Query the distributor's current time-lock.
    ///
    /// `Ok(None)` means no lock is recorded.
    async fn timelock(&self) -> Result<Option<RawTimelock>, DistributorError>;
}

#[async_trait]
impl<T: PrizeDistributor + ?Sized> PrizeDistributor for std::sync::Arc<T> {
    fn id(&self) -> DistributorId {
        (**self).id()
    }

    async fn timelock(&self) -> Result<Option<RawTimelock>, DistributorError> {
        (**self).timelock().await
    }
}
