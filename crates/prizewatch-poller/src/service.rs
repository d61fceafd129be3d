//! Draw-lock poller service
//!
//! [`DrawLockPoller`] is a handle to a single reactor task. The reactor owns
//! the [`DistributorTracker`] outright; the handle only sends commands and
//! reads published snapshots, so no lock guards the schedule.
//!
//! # Re-query triggers
//!
//! - a distributor joins the active set
//! - the draw period changes (every status is reset to loading and every
//!   distributor is re-queried at once)
//! - a distributor's adapted or default interval elapses
//! - [`DrawLockPoller::refresh`]
//!
//! Nothing is queried until the first draw period is known.
//!
//! # Cancellation
//!
//! Each in-flight query carries an [`AbortHandle`]. Removing a distributor,
//! superseding its query, or shutting the poller down aborts it; a completion
//! that still slips through is rejected by the tracker's generation check.

use crate::core::{
    ConfigError, PollResult, PollerConfig, PollerMetrics, PollerMetricsSnapshot, ServiceError,
};
use crate::events::{PollerEvent, PollerSnapshot, RequeryReason};
use crate::lock::fetch_draw_lock;
use crate::tracker::{Completion, DistributorTracker};
use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture};
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use prizewatch_core::{
    DistributorId, DrawPeriodId, PhysicalTimeEffects, PrizeDistributor, TimeLock,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum Command {
    SetDistributors(Vec<Arc<dyn PrizeDistributor>>),
    SetDrawPeriod(DrawPeriodId),
    Refresh,
}

/// Handle to a running draw-lock poller
///
/// Dropping the handle shuts the reactor down.
pub struct DrawLockPoller {
    commands: mpsc::UnboundedSender<Command>,
    shutdown_tx: watch::Sender<bool>,
    stopped: AtomicBool,
    status_rx: watch::Receiver<PollerSnapshot>,
    events_tx: broadcast::Sender<PollerEvent>,
    metrics: Arc<PollerMetrics>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl DrawLockPoller {
    /// Validate `config` and start the reactor on the current Tokio runtime.
    pub fn spawn<C>(config: PollerConfig, clock: Arc<C>) -> Result<Self, ConfigError>
    where
        C: PhysicalTimeEffects + ?Sized + 'static,
    {
        config.validate()?;

        let (commands, command_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(PollerSnapshot::default());
        let (events_tx, _events_rx) = broadcast::channel(config.event_capacity);
        let metrics = Arc::new(PollerMetrics::new());

        let reactor = Reactor {
            tracker: DistributorTracker::new(config.default_interval_ms),
            config,
            clock,
            handles: BTreeMap::new(),
            aborts: HashMap::new(),
            in_flight: FuturesUnordered::new(),
            draw_period: None,
            last_now_ms: 0,
            status_tx,
            events_tx: events_tx.clone(),
            metrics: Arc::clone(&metrics),
        };
        let task = tokio::spawn(reactor.run(command_rx, shutdown_rx));

        Ok(Self {
            commands,
            shutdown_tx,
            stopped: AtomicBool::new(false),
            status_rx,
            events_tx,
            metrics,
            task: Mutex::new(Some(task)),
        })
    }

    /// Replace the set of distributors to track.
    ///
    /// Newly added distributors are queried immediately (once a draw period is
    /// known). Distributors that are no longer present are forgotten and their
    /// in-flight queries abandoned.
    pub fn set_distributors(
        &self,
        distributors: Vec<Arc<dyn PrizeDistributor>>,
    ) -> Result<(), ServiceError> {
        self.send(Command::SetDistributors(distributors))
    }

    /// Announce the current draw period.
    ///
    /// A period different from the last one discards every known result:
    /// each distributor goes back to
    /// [`LockStatus::Loading`](prizewatch_core::LockStatus::Loading) and is
    /// re-queried at once.
    pub fn set_draw_period(&self, period: DrawPeriodId) -> Result<(), ServiceError> {
        self.send(Command::SetDrawPeriod(period))
    }

    /// Re-query every distributor now.
    pub fn refresh(&self) -> Result<(), ServiceError> {
        self.send(Command::Refresh)
    }

    /// Watch the per-distributor status view.
    pub fn subscribe_status(&self) -> watch::Receiver<PollerSnapshot> {
        self.status_rx.clone()
    }

    /// Latest published status view.
    pub fn snapshot(&self) -> PollerSnapshot {
        self.status_rx.borrow().clone()
    }

    /// Subscribe to reactor events from this point on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<PollerEvent> {
        self.events_tx.subscribe()
    }

    /// Current counter values.
    pub fn metrics(&self) -> PollerMetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Stop the reactor and abandon every in-flight query.
    pub fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        debug!("draw-lock poller shut down");
    }

    fn send(&self, command: Command) -> Result<(), ServiceError> {
        if self.is_stopped() {
            return Err(ServiceError::Stopped);
        }
        self.commands
            .send(command)
            .map_err(|_| ServiceError::Stopped)
    }
}

impl Drop for DrawLockPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct QueryOutcome {
    distributor: DistributorId,
    generation: u64,
    result: Result<PollResult<Option<TimeLock>>, Aborted>,
}

struct Reactor<C: ?Sized> {
    config: PollerConfig,
    clock: Arc<C>,
    tracker: DistributorTracker,
    handles: BTreeMap<DistributorId, Arc<dyn PrizeDistributor>>,
    aborts: HashMap<DistributorId, AbortHandle>,
    in_flight: FuturesUnordered<BoxFuture<'static, QueryOutcome>>,
    draw_period: Option<DrawPeriodId>,
    last_now_ms: u64,
    status_tx: watch::Sender<PollerSnapshot>,
    events_tx: broadcast::Sender<PollerEvent>,
    metrics: Arc<PollerMetrics>,
}

impl<C> Reactor<C>
where
    C: PhysicalTimeEffects + ?Sized + 'static,
{
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        debug!("draw-lock reactor started");
        loop {
            let wait_ms = self.next_wait_ms().await;

            tokio::select! {
                biased;

                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        break;
                    }
                }
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(outcome) = self.in_flight.next(), if !self.in_flight.is_empty() => {
                    self.handle_outcome(outcome).await;
                }
                slept = self.clock.sleep_ms(wait_ms.unwrap_or_default()), if wait_ms.is_some() => {
                    if let Err(err) = slept {
                        warn!(error = %err, "reactor sleep failed");
                    }
                    self.issue_due().await;
                }
            }
        }

        for (_, abort) in self.aborts.drain() {
            abort.abort();
        }
        debug!("draw-lock reactor stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::SetDistributors(distributors) => self.set_distributors(distributors),
            Command::SetDrawPeriod(period) => self.set_draw_period(period),
            Command::Refresh => {
                if self.draw_period.is_none() {
                    debug!("refresh ignored until a draw period is known");
                    return;
                }
                self.issue_all(RequeryReason::Manual);
            }
        }
        self.publish();
    }

    fn set_distributors(&mut self, distributors: Vec<Arc<dyn PrizeDistributor>>) {
        let mut handles = BTreeMap::new();
        let mut ids = Vec::with_capacity(distributors.len());
        for distributor in distributors {
            let id = distributor.id();
            if handles.contains_key(&id) {
                warn!(distributor = %id, "duplicate distributor id ignored");
                continue;
            }
            ids.push(id.clone());
            handles.insert(id, distributor);
        }
        self.handles = handles;

        let membership = self.tracker.sync_members(&ids);
        for id in membership.removed {
            if let Some(abort) = self.aborts.remove(&id) {
                abort.abort();
            }
            info!(distributor = %id, "distributor removed");
            self.emit(PollerEvent::DistributorRemoved { distributor: id });
        }

        if !membership.added.is_empty() {
            info!(added = membership.added.len(), "distributors added");
        }
        if self.draw_period.is_some() {
            for id in &membership.added {
                self.issue(id, RequeryReason::DistributorAdded);
            }
        }
    }

    fn set_draw_period(&mut self, period: DrawPeriodId) {
        if self.draw_period == Some(period) {
            debug!(%period, "draw period unchanged");
            return;
        }
        info!(%period, previous = ?self.draw_period, "draw period changed");
        self.draw_period = Some(period);
        self.issue_all(RequeryReason::DrawPeriodChanged);
    }

    fn issue_all(&mut self, reason: RequeryReason) {
        for id in self.tracker.ids() {
            self.issue(&id, reason);
        }
    }

    fn issue(&mut self, id: &DistributorId, reason: RequeryReason) {
        let Some(distributor) = self.handles.get(id).cloned() else {
            return;
        };
        let invalidate = reason == RequeryReason::DrawPeriodChanged;
        let Some(generation) = self.tracker.begin_query(id, invalidate) else {
            return;
        };
        if let Some(previous) = self.aborts.remove(id) {
            previous.abort();
        }

        let (abort, registration) = AbortHandle::new_pair();
        self.aborts.insert(id.clone(), abort);

        let clock = Arc::clone(&self.clock);
        let config = self.config.clone();
        let query = Abortable::new(
            async move { fetch_draw_lock(clock.as_ref(), distributor.as_ref(), &config).await },
            registration,
        );
        let distributor = id.clone();
        self.in_flight.push(
            async move {
                QueryOutcome {
                    distributor,
                    generation,
                    result: query.await,
                }
            }
            .boxed(),
        );

        self.metrics.record_issued();
        debug!(distributor = %id, ?reason, generation, "draw-lock query issued");
        self.emit(PollerEvent::QueryIssued {
            distributor: id.clone(),
            reason,
        });
    }

    async fn issue_due(&mut self) {
        let now_ms = self.now_ms().await;
        for id in self.tracker.pop_due(now_ms) {
            self.issue(&id, RequeryReason::IntervalElapsed);
        }
    }

    async fn handle_outcome(&mut self, outcome: QueryOutcome) {
        let QueryOutcome {
            distributor,
            generation,
            result,
        } = outcome;

        let Ok(result) = result else {
            self.discard_stale(distributor);
            return;
        };

        let now_ms = self.now_ms().await;
        match self.tracker.complete(&distributor, generation, &result, now_ms) {
            Completion::Stale => self.discard_stale(distributor),
            Completion::Applied {
                lock, next_poll_ms, ..
            } => {
                self.aborts.remove(&distributor);
                match result {
                    Ok(_) => {
                        self.metrics.record_success(lock.is_some());
                        debug!(
                            distributor = %distributor,
                            locked = lock.is_some(),
                            next_poll_ms,
                            "draw-lock query resolved"
                        );
                        self.emit(PollerEvent::LockResolved {
                            distributor,
                            lock,
                            next_poll_ms,
                        });
                    }
                    Err(err) => {
                        self.metrics.record_failure();
                        warn!(
                            distributor = %distributor,
                            error = %err,
                            next_poll_ms,
                            "draw-lock query failed"
                        );
                        self.emit(PollerEvent::QueryFailed {
                            distributor,
                            error: err.to_string(),
                            next_poll_ms,
                        });
                    }
                }
                self.publish();
            }
        }
    }

    fn discard_stale(&mut self, distributor: DistributorId) {
        self.metrics.record_stale();
        debug!(distributor = %distributor, "stale draw-lock completion discarded");
        self.emit(PollerEvent::StaleCompletionDiscarded { distributor });
    }

    async fn next_wait_ms(&mut self) -> Option<u64> {
        let due_ms = self.tracker.next_deadline_ms()?;
        let now_ms = self.now_ms().await;
        Some(due_ms.saturating_sub(now_ms))
    }

    /// Wall time, or the last reading if the clock fails.
    async fn now_ms(&mut self) -> u64 {
        match self.clock.physical_time().await {
            Ok(now) => {
                self.last_now_ms = now.ts_ms;
                now.ts_ms
            }
            Err(err) => {
                warn!(error = %err, last_now_ms = self.last_now_ms, "clock unavailable");
                self.last_now_ms
            }
        }
    }

    fn publish(&self) {
        self.status_tx.send_replace(PollerSnapshot {
            draw_period: self.draw_period,
            distributors: self.tracker.snapshot(),
        });
    }

    fn emit(&self, event: PollerEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}
