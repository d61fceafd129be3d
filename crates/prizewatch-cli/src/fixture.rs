//! In-process distributors driven by the config file.

use crate::config::FixtureSpec;
use async_trait::async_trait;
use prizewatch_core::{DistributorError, DistributorId, PrizeDistributor, RawTimelock};
use std::sync::Arc;

/// Distributor that answers with a fixed lock, no lock, or a fixed failure
#[derive(Debug, Clone)]
pub struct FixtureDistributor {
    id: DistributorId,
    lock: Option<RawTimelock>,
    fail: Option<String>,
}

impl FixtureDistributor {
    /// Build from a config entry, anchoring relative lock times at `started_secs`.
    pub fn from_spec(spec: &FixtureSpec, started_secs: u64) -> Self {
        let lock = spec
            .lock_in_secs
            .map(|secs| RawTimelock::new(started_secs.saturating_add(secs), spec.draw_id));
        Self {
            id: DistributorId::new(spec.id.clone()),
            lock,
            fail: spec.fail.clone(),
        }
    }
}

#[async_trait]
impl PrizeDistributor for FixtureDistributor {
    fn id(&self) -> DistributorId {
        self.id.clone()
    }

    async fn timelock(&self) -> Result<Option<RawTimelock>, DistributorError> {
        match &self.fail {
            Some(reason) => Err(DistributorError::network(reason.clone())),
            None => Ok(self.lock),
        }
    }
}

/// Build every configured fixture.
pub fn build_all(specs: &[FixtureSpec], started_secs: u64) -> Vec<Arc<dyn PrizeDistributor>> {
    specs
        .iter()
        .map(|spec| Arc::new(FixtureDistributor::from_spec(spec, started_secs)) as Arc<dyn PrizeDistributor>)
        .collect()
}
