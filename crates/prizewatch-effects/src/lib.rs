//! Effect handlers for prizewatch.
//!
//! Implementations of the effect traits defined in `prizewatch-core`:
//! a production clock backed by the operating system and a simulated clock
//! whose time only moves when the caller advances it.

#![forbid(unsafe_code)]

pub mod time;

pub use time::{RealTimeHandler, SimulatedTimeHandler};
