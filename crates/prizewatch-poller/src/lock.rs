//! Draw-lock queries.
//!
//! A query asks one distributor for its current time-lock and turns the raw
//! answer into either an active, buffered [`TimeLock`] or `None`. Expired
//! locks are never surfaced as active.

use crate::core::{PollError, PollResult, PollerConfig};
use futures::future::join_all;
use prizewatch_core::{
    DistributorId, PhysicalTimeEffects, PrizeDistributor, RawTimelock, TimeLock,
};
use std::sync::Arc;
use tracing::debug;

/// Query every distributor concurrently.
///
/// Results are returned in input order. Each distributor's outcome is
/// independent: one rejected query does not affect the others.
pub async fn poll_draw_locks<C>(
    clock: &C,
    config: &PollerConfig,
    distributors: &[Arc<dyn PrizeDistributor>],
) -> Vec<(DistributorId, PollResult<Option<TimeLock>>)>
where
    C: PhysicalTimeEffects + ?Sized,
{
    join_all(distributors.iter().map(|distributor| async move {
        let result = fetch_draw_lock(clock, distributor.as_ref(), config).await;
        (distributor.id(), result)
    }))
    .await
}

/// Query one distributor for its current lock.
pub async fn fetch_draw_lock<C, D>(
    clock: &C,
    distributor: &D,
    config: &PollerConfig,
) -> PollResult<Option<TimeLock>>
where
    C: PhysicalTimeEffects + ?Sized,
    D: PrizeDistributor + ?Sized,
{
    let id = distributor.id();
    let Some(raw) = query_timelock(clock, distributor, &id, config.query_timeout()).await? else {
        debug!(distributor = %id, "no time-lock recorded");
        return Ok(None);
    };

    let now_secs = clock.physical_time().await?.unix_seconds();
    let lock = validate_lock(id, raw, now_secs, config.expiry_buffer_secs)?;
    if let Some(lock) = &lock {
        debug!(
            distributor = %lock.distributor_id,
            end_time_seconds = lock.end_time_seconds,
            draw_id = lock.draw_id,
            "time-lock active"
        );
    }
    Ok(lock)
}

/// Validate a raw lock against `now_secs`.
///
/// Returns `Ok(None)` when the lock ends at or before `now_secs`, otherwise a
/// lock whose expiry is pushed back by `buffer_secs`.
pub fn validate_lock(
    distributor: DistributorId,
    raw: RawTimelock,
    now_secs: u64,
    buffer_secs: u64,
) -> PollResult<Option<TimeLock>> {
    let Some(end_time_seconds) = raw.end_time_seconds else {
        return Err(PollError::MalformedLock {
            distributor,
            reason: "end time missing or not an integer".to_string(),
        });
    };

    if end_time_seconds <= now_secs {
        debug!(
            distributor = %distributor,
            end_time_seconds,
            now_secs,
            "time-lock already expired"
        );
        return Ok(None);
    }

    let Some(buffered) = end_time_seconds.checked_add(buffer_secs) else {
        return Err(PollError::MalformedLock {
            distributor,
            reason: format!("end time {end_time_seconds} out of range"),
        });
    };

    Ok(Some(TimeLock {
        distributor_id: distributor,
        end_time_seconds: buffered,
        draw_id: raw.draw_id,
    }))
}

async fn query_timelock<C, D>(
    clock: &C,
    distributor: &D,
    id: &DistributorId,
    timeout_ms: Option<u64>,
) -> PollResult<Option<RawTimelock>>
where
    C: PhysicalTimeEffects + ?Sized,
    D: PrizeDistributor + ?Sized,
{
    let query = distributor.timelock();
    let result = match timeout_ms {
        None => query.await,
        Some(timeout_ms) => {
            tokio::select! {
                result = query => result,
                slept = clock.sleep_ms(timeout_ms) => {
                    slept?;
                    return Err(PollError::Timeout {
                        distributor: id.clone(),
                        timeout_ms,
                    });
                }
            }
        }
    };
    result.map_err(|source| PollError::Query {
        distributor: id.clone(),
        source,
    })
}
