//! Prizewatch CLI
//!
//! Runs the draw-lock poller against distributors described in a config
//! file, or explains how a single lock would be scheduled.

use anyhow::Result;
use clap::{Parser, Subcommand};
use prizewatch_core::{
    ms_to_secs, DistributorId, DrawPeriodId, LockStatus, PhysicalTimeEffects, RawTimelock,
};
use prizewatch_effects::RealTimeHandler;
use prizewatch_poller::{interval_until_expiry_ms, validate_lock, DrawLockPoller, PollerSnapshot};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

mod config;
mod fixture;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "prizewatch")]
#[command(about = "Prizewatch - draw time-lock poller for prize distributors", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file path
    #[arg(short, long, global = true, default_value = "prizewatch.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured distributors and log every status change
    Watch {
        /// Stop after this many seconds
        #[arg(short, long, default_value = "60")]
        duration_secs: u64,
    },

    /// Show the refetch interval chosen for a lock ending N seconds from now
    Schedule {
        /// Seconds until the lock ends
        #[arg(short, long)]
        lock_in_secs: u64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt().with_env_filter(log_level).init();

    let config = CliConfig::load(&cli.config)?;

    match cli.command {
        Commands::Watch { duration_secs } => watch(config, duration_secs).await?,
        Commands::Schedule { lock_in_secs } => schedule(&config, lock_in_secs).await?,
    }

    Ok(())
}

async fn watch(config: CliConfig, duration_secs: u64) -> Result<()> {
    let clock = Arc::new(RealTimeHandler::new());
    let now_secs = ms_to_secs(clock.physical_time().await?.ts_ms);

    let poller = DrawLockPoller::spawn(config.poller.clone(), clock)?;
    let mut status = poller.subscribe_status();

    poller.set_distributors(fixture::build_all(&config.distributors, now_secs))?;
    let started_at = config.draw_period_started_at.unwrap_or(now_secs);
    poller.set_draw_period(DrawPeriodId::from_started_at(started_at))?;
    info!(
        distributors = config.distributors.len(),
        period = %DrawPeriodId::from_started_at(started_at),
        duration_secs,
        "watching draw locks"
    );

    let mut last_seen = BTreeMap::new();
    let deadline = tokio::time::sleep(Duration::from_secs(duration_secs));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            changed = status.changed() => {
                if changed.is_err() {
                    warn!("poller stopped before the watch window ended");
                    break;
                }
                let snapshot = status.borrow_and_update().clone();
                report_changes(&snapshot, &mut last_seen);
            }
        }
    }

    println!("{}", serde_json::to_string_pretty(&poller.snapshot())?);
    println!("{}", serde_json::to_string_pretty(&poller.metrics())?);
    poller.shutdown();
    Ok(())
}

/// Log every distributor whose status differs from `last_seen`.
///
/// Returns the ids that were logged.
fn report_changes(
    snapshot: &PollerSnapshot,
    last_seen: &mut BTreeMap<DistributorId, LockStatus>,
) -> Vec<DistributorId> {
    last_seen.retain(|id, _| snapshot.distributors.contains_key(id));

    let mut changed = Vec::new();
    for (id, view) in &snapshot.distributors {
        if last_seen.get(id) == Some(&view.status) {
            continue;
        }
        match &view.status {
            LockStatus::Failed { reason } => {
                warn!(distributor = %id, %reason, next_poll_ms = view.refetch_interval_ms, "query failed");
            }
            status => {
                info!(distributor = %id, ?status, next_poll_ms = view.refetch_interval_ms, "status changed");
            }
        }
        last_seen.insert(id.clone(), view.status.clone());
        changed.push(id.clone());
    }
    changed
}

async fn schedule(config: &CliConfig, lock_in_secs: u64) -> Result<()> {
    let now_secs = ms_to_secs(RealTimeHandler::new().physical_time().await?.ts_ms);
    let raw = RawTimelock::new(now_secs.saturating_add(lock_in_secs), 0);

    let lock = validate_lock(
        DistributorId::new("cli"),
        raw,
        now_secs,
        config.poller.expiry_buffer_secs,
    )?;

    match lock.and_then(|lock| {
        interval_until_expiry_ms(lock.end_time_seconds, now_secs).map(|ms| (lock, ms))
    }) {
        Some((lock, interval_ms)) => println!(
            "lock ends at {} (buffered by {}s); next poll in {} ms",
            lock.end_time_seconds, config.poller.expiry_buffer_secs, interval_ms
        ),
        None => println!(
            "no active lock; next poll in {} ms",
            config.poller.default_interval_ms
        ),
    }
    Ok(())
}
