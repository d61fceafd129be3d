//! Test infrastructure for prizewatch.
//!
//! - [`ScriptedDistributor`]: a distributor that answers from a script,
//!   including answers held back until the test releases them
//! - [`FlakyClock`]: a simulated clock whose reads can be made to fail
//! - [`fixtures`]: clocks and tracing setup shared by test suites

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod clock;
pub mod distributor;
pub mod fixtures;

pub use clock::FlakyClock;
pub use distributor::{ScriptedDistributor, ScriptedResult};
pub use fixtures::{clock_at, init_test_tracing};
