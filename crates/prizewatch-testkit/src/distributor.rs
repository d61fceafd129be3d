//! Scripted prize distributor.

use async_trait::async_trait;
use parking_lot::Mutex;
use prizewatch_core::{DistributorError, DistributorId, DrawId, PrizeDistributor, RawTimelock};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

/// What a distributor query resolves to.
pub type ScriptedResult = Result<Option<RawTimelock>, DistributorError>;

enum Step {
    Ready(ScriptedResult),
    Gated(oneshot::Receiver<ScriptedResult>),
}

/// Distributor that replays queued answers in order.
///
/// Once the script is exhausted every query answers with the fallback, which
/// defaults to "no lock".
pub struct ScriptedDistributor {
    id: DistributorId,
    script: Mutex<VecDeque<Step>>,
    fallback: Mutex<ScriptedResult>,
    calls: AtomicUsize,
}

impl ScriptedDistributor {
    /// New distributor with an empty script.
    pub fn new(id: impl Into<DistributorId>) -> Arc<Self> {
        Arc::new(Self {
            id: id.into(),
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(Ok(None)),
            calls: AtomicUsize::new(0),
        })
    }

    /// Queue an arbitrary answer.
    pub fn push(&self, result: ScriptedResult) {
        self.script.lock().push_back(Step::Ready(result));
    }

    /// Queue a lock ending at `end_time_seconds`.
    pub fn push_lock(&self, end_time_seconds: u64, draw_id: DrawId) {
        self.push(Ok(Some(RawTimelock::new(end_time_seconds, draw_id))));
    }

    /// Queue a "no lock" answer.
    pub fn push_unlocked(&self) {
        self.push(Ok(None));
    }

    /// Queue a lock whose end time could not be decoded.
    pub fn push_malformed(&self, draw_id: DrawId) {
        self.push(Ok(Some(RawTimelock {
            end_time_seconds: None,
            draw_id,
        })));
    }

    /// Queue a rejected query.
    pub fn push_error(&self, error: DistributorError) {
        self.push(Err(error));
    }

    /// Queue an answer that is held until the returned sender fires.
    ///
    /// Dropping the sender resolves the query with a network error.
    pub fn push_gated(&self) -> oneshot::Sender<ScriptedResult> {
        let (tx, rx) = oneshot::channel();
        self.script.lock().push_back(Step::Gated(rx));
        tx
    }

    /// Answer used once the script runs out.
    pub fn set_fallback(&self, result: ScriptedResult) {
        *self.fallback.lock() = result;
    }

    /// Number of queries received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Type-erased handle for the poller.
    pub fn handle(self: &Arc<Self>) -> Arc<dyn PrizeDistributor> {
        Arc::clone(self) as Arc<dyn PrizeDistributor>
    }
}

#[async_trait]
impl PrizeDistributor for ScriptedDistributor {
    fn id(&self) -> DistributorId {
        self.id.clone()
    }

    async fn timelock(&self) -> Result<Option<RawTimelock>, DistributorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.script.lock().pop_front();
        match step {
            Some(Step::Ready(result)) => result,
            Some(Step::Gated(rx)) => rx
                .await
                .unwrap_or_else(|_| Err(DistributorError::network("gate dropped"))),
            None => self.fallback.lock().clone(),
        }
    }
}
