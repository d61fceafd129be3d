//! Shared test fixtures.

use prizewatch_effects::SimulatedTimeHandler;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Simulated clock frozen at `secs` seconds since the UNIX epoch.
pub fn clock_at(secs: u64) -> Arc<SimulatedTimeHandler> {
    Arc::new(SimulatedTimeHandler::at_seconds(secs))
}

/// Route `tracing` output through the test harness.
///
/// Honors `RUST_LOG`; safe to call from every test.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_test_writer()
        .try_init();
}
