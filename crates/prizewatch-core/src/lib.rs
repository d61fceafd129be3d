//! Prizewatch core: domain types and effect traits.
//!
//! This crate is the foundation layer for prize-distributor lock tracking.
//! It owns the vocabulary shared by every other crate in the workspace:
//!
//! - **Types**: distributor identifiers, draw periods, raw and validated time-locks,
//!   and the per-distributor [`LockStatus`] exposed to presentation layers
//! - **Time**: wall-clock timestamps and the second/millisecond conversions used
//!   for every expiry comparison
//! - **Effects**: the two external collaborators, a physical clock and a prize
//!   distributor handle, expressed as async traits
//!
//! No handler lives here. Production and simulated clocks are in
//! `prizewatch-effects`; scripted distributors are in `prizewatch-testkit`.

#![forbid(unsafe_code)]

pub mod effects;
pub mod time;
pub mod types;

pub use effects::{DistributorError, PhysicalTimeEffects, PrizeDistributor, TimeError};
pub use time::{ms_to_secs, secs_to_ms, PhysicalTime};
pub use types::{DistributorId, DrawId, DrawPeriodId, LockStatus, RawTimelock, TimeLock};
