//! Prizewatch Poller: expiry-aligned draw-lock tracking
//!
//! This crate keeps a near-real-time view of whether each known prize
//! distributor currently holds a draw time-lock, while issuing as few queries
//! as possible.
//!
//! # Architecture Overview
//!
//! - [`lock`]: one query per distributor, validating and buffering the result
//! - [`schedule`]: the refetch-interval map and the deadline queue
//! - [`tracker`]: synchronous bookkeeping with the stale-completion guard
//! - [`service`]: the reactor task that owns all mutable state and reacts to
//!   membership changes, draw-period changes and elapsed intervals
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use prizewatch_core::{DrawPeriodId, PrizeDistributor};
//! use prizewatch_effects::RealTimeHandler;
//! use prizewatch_poller::{DrawLockPoller, PollerConfig};
//!
//! # async fn example(distributors: Vec<Arc<dyn PrizeDistributor>>) -> Result<(), Box<dyn std::error::Error>> {
//! let poller = DrawLockPoller::spawn(PollerConfig::default(), Arc::new(RealTimeHandler::new()))?;
//! poller.set_distributors(distributors)?;
//! poller.set_draw_period(DrawPeriodId::from_started_at(1_700_000_000))?;
//!
//! let mut status = poller.subscribe_status();
//! status.changed().await?;
//! for (id, view) in &status.borrow().distributors {
//!     println!("{id}: {:?}", view.status);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

/// Configuration, errors and metrics shared by the poller modules
pub mod core;

/// Event and snapshot types published by the poller
pub mod events;

/// Single-distributor and fan-out lock queries
pub mod lock;

/// Refetch-interval map and deadline queue
pub mod schedule;

/// Reactor task and its handle
pub mod service;

/// Per-distributor bookkeeping owned by the reactor
pub mod tracker;

pub use crate::core::{
    ConfigError, PollError, PollResult, PollerConfig, PollerMetrics, PollerMetricsSnapshot,
    ServiceError, DEFAULT_REFETCH_INTERVAL_MS,
};
pub use events::{PollerEvent, PollerSnapshot, RequeryReason};
pub use lock::{fetch_draw_lock, poll_draw_locks, validate_lock};
pub use schedule::{interval_until_expiry_ms, DeadlineQueue, RefetchSchedule};
pub use service::DrawLockPoller;
pub use tracker::{Completion, DistributorTracker, DistributorView, Membership};
