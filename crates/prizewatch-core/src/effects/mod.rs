//! Effect traits for the poller's external collaborators.
//!
//! # Effect Classification
//!
//! - **Category**: Infrastructure Effect
//! - **Implementation**: `prizewatch-effects` (clock), chain clients or
//!   `prizewatch-testkit` (distributors)
//! - **Usage**: `prizewatch-poller` reaches wall time and distributors only
//!   through these traits

pub mod distributor;
pub mod time;

pub use distributor::{DistributorError, PrizeDistributor};
pub use time::{PhysicalTimeEffects, TimeError};
