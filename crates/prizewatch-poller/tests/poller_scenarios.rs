//! End-to-end behavior of the draw-lock poller on a simulated clock.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_matches::assert_matches;
use prizewatch_core::{DistributorError, DrawPeriodId, LockStatus, RawTimelock, TimeLock};
use prizewatch_poller::{
    DrawLockPoller, PollerConfig, PollerEvent, PollerSnapshot, RequeryReason, ServiceError,
};
use prizewatch_testkit::{clock_at, init_test_tracing, FlakyClock, ScriptedDistributor};
use std::time::Duration;
use tokio::sync::{broadcast, watch};

const NOW: u64 = 1_700_000_000;

fn period(started_at: u64) -> DrawPeriodId {
    DrawPeriodId::from_started_at(started_at)
}

/// Wait for the first event matching `pred`, skipping others.
async fn wait_for(
    events: &mut broadcast::Receiver<PollerEvent>,
    pred: impl Fn(&PollerEvent) -> bool,
) -> PollerEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("event stream open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("expected event within timeout")
}

/// Wait until every predicate has matched one event, in any order.
async fn wait_for_each(
    events: &mut broadcast::Receiver<PollerEvent>,
    preds: &[&dyn Fn(&PollerEvent) -> bool],
) -> Vec<PollerEvent> {
    let mut found: Vec<Option<PollerEvent>> = vec![None; preds.len()];
    tokio::time::timeout(Duration::from_secs(5), async {
        while found.iter().any(Option::is_none) {
            let event = events.recv().await.expect("event stream open");
            let slot = preds
                .iter()
                .enumerate()
                .position(|(i, pred)| found[i].is_none() && pred(&event));
            if let Some(i) = slot {
                found[i] = Some(event);
            }
        }
    })
    .await
    .expect("expected events within timeout");
    found.into_iter().flatten().collect()
}

async fn wait_for_status(
    status: &mut watch::Receiver<PollerSnapshot>,
    pred: impl Fn(&PollerSnapshot) -> bool,
) -> PollerSnapshot {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = status.borrow_and_update();
                if pred(&*snapshot) {
                    return (*snapshot).clone();
                }
            }
            status.changed().await.expect("status channel open");
        }
    })
    .await
    .expect("expected status within timeout")
}

fn resolved(name: &'static str) -> impl Fn(&PollerEvent) -> bool {
    move |event| matches!(event, PollerEvent::LockResolved { distributor, .. } if distributor.as_str() == name)
}

fn issued(name: &'static str, why: RequeryReason) -> impl Fn(&PollerEvent) -> bool {
    move |event| {
        matches!(event, PollerEvent::QueryIssued { distributor, reason } if distributor.as_str() == name && *reason == why)
    }
}

#[tokio::test]
async fn active_lock_schedules_next_poll_at_expiry() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    a.push_lock(NOW + 300, 7);
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW - 60)).unwrap();

    let event = wait_for(&mut events, resolved("A")).await;
    assert_matches!(
        event,
        PollerEvent::LockResolved { lock: Some(lock), next_poll_ms, .. } => {
            assert_eq!(lock, TimeLock { distributor_id: "A".into(), end_time_seconds: NOW + 301, draw_id: 7 });
            assert!(next_poll_ms.abs_diff(300_000) <= 1_000);
        }
    );

    let snapshot = poller.snapshot();
    let view = snapshot.get("A").unwrap();
    assert_eq!(
        view.status,
        LockStatus::Locked {
            end_time_seconds: NOW + 301,
            draw_id: 7
        }
    );
    assert!(view.adapted);

    // Nothing happens before the lock expires.
    clock.advance_secs(300);
    tokio::task::yield_now().await;
    assert_eq!(a.calls(), 1);

    // The script is exhausted, so the re-query finds no lock.
    clock.advance_secs(1);
    wait_for(&mut events, issued("A", RequeryReason::IntervalElapsed)).await;
    let event = wait_for(&mut events, resolved("A")).await;
    assert_matches!(
        event,
        PollerEvent::LockResolved { lock: None, next_poll_ms: 150_000, .. }
    );
    assert_eq!(a.calls(), 2);
    assert!(!poller.snapshot().get("A").unwrap().adapted);
}

#[tokio::test]
async fn expired_lock_is_unlocked_with_default_cadence() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let b = ScriptedDistributor::new("B");
    b.push_lock(NOW - 5, 3);
    poller.set_distributors(vec![b.handle()]).unwrap();
    poller.set_draw_period(period(NOW - 60)).unwrap();

    let event = wait_for(&mut events, resolved("B")).await;
    assert_matches!(
        event,
        PollerEvent::LockResolved { lock: None, next_poll_ms: 150_000, .. }
    );
    let snapshot = poller.snapshot();
    let view = snapshot.get("B").unwrap();
    assert_eq!(view.status, LockStatus::Unlocked);
    assert_eq!(view.refetch_interval_ms, 150_000);

    clock.advance_ms(150_000);
    wait_for(&mut events, issued("B", RequeryReason::IntervalElapsed)).await;
}

#[tokio::test]
async fn failing_distributor_does_not_affect_siblings() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut status = poller.subscribe_status();

    let c = ScriptedDistributor::new("C");
    c.push_error(DistributorError::network("connection refused"));
    let d = ScriptedDistributor::new("D");
    d.push_lock(NOW + 120, 2);
    poller.set_distributors(vec![c.handle(), d.handle()]).unwrap();
    poller.set_draw_period(period(NOW - 60)).unwrap();

    let snapshot = wait_for_status(&mut status, |s| {
        s.distributors.len() == 2
            && s.distributors.values().all(|view| view.status != LockStatus::Loading)
    })
    .await;

    let c_view = snapshot.get("C").unwrap();
    assert_matches!(&c_view.status, LockStatus::Failed { reason } if reason.contains("connection refused"));
    assert_eq!(c_view.refetch_interval_ms, 150_000);

    let d_view = snapshot.get("D").unwrap();
    assert_eq!(
        d_view.status,
        LockStatus::Locked {
            end_time_seconds: NOW + 121,
            draw_id: 2
        }
    );
    assert_eq!(d_view.refetch_interval_ms, 121_000);

    let metrics = poller.metrics();
    assert_eq!(metrics.queries_issued, 2);
    assert_eq!(metrics.queries_failed, 1);
    assert_eq!(metrics.queries_succeeded, 1);
}

#[tokio::test]
async fn failed_query_retries_on_default_cadence() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let c = ScriptedDistributor::new("C");
    c.push_malformed(4);
    c.push_lock(NOW + 500, 4);
    poller.set_distributors(vec![c.handle()]).unwrap();
    poller.set_draw_period(period(NOW - 60)).unwrap();

    let failed = wait_for(&mut events, |e| matches!(e, PollerEvent::QueryFailed { .. })).await;
    assert_matches!(failed, PollerEvent::QueryFailed { next_poll_ms: 150_000, .. });

    clock.advance_ms(150_000);
    let event = wait_for(&mut events, resolved("C")).await;
    assert_matches!(
        event,
        PollerEvent::LockResolved { lock: Some(lock), next_poll_ms: 351_000, .. } if lock.end_time_seconds == NOW + 501
    );
}

#[tokio::test]
async fn draw_period_change_requeries_every_distributor() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    let b = ScriptedDistributor::new("B");
    a.push_lock(NOW + 3_600, 1);
    b.push_unlocked();
    poller.set_distributors(vec![a.handle(), b.handle()]).unwrap();
    poller.set_draw_period(period(NOW - 60)).unwrap();
    wait_for_each(&mut events, &[&resolved("A"), &resolved("B")]).await;

    // Same period again is not a trigger.
    poller.set_draw_period(period(NOW - 60)).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for_each(
        &mut events,
        &[
            &issued("A", RequeryReason::DrawPeriodChanged),
            &issued("B", RequeryReason::DrawPeriodChanged),
            &resolved("A"),
            &resolved("B"),
        ],
    )
    .await;

    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
    assert_eq!(poller.snapshot().draw_period, Some(period(NOW)));
}

#[tokio::test]
async fn draw_period_change_resets_status_to_loading() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut status = poller.subscribe_status();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    a.push_lock(NOW + 3_600, 1);
    let gate = a.push_gated();
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, resolved("A")).await;
    assert!(poller.snapshot().get("A").unwrap().status.is_locked());

    // The new period's answer is held back, so the old result must not linger.
    poller.set_draw_period(period(NOW + 1)).unwrap();
    let snapshot =
        wait_for_status(&mut status, |s| s.draw_period == Some(period(NOW + 1))).await;
    let view = snapshot.get("A").unwrap();
    assert_eq!(view.status, LockStatus::Loading);
    assert!(!view.adapted);

    gate.send(Ok(Some(RawTimelock::new(NOW + 600, 2)))).unwrap();
    let snapshot = wait_for_status(&mut status, |s| {
        s.get("A").is_some_and(|view| view.status != LockStatus::Loading)
    })
    .await;
    assert_eq!(
        snapshot.get("A").unwrap().status,
        LockStatus::Locked {
            end_time_seconds: NOW + 601,
            draw_id: 2
        }
    );
}

#[tokio::test]
async fn refresh_requeries_every_distributor() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    let b = ScriptedDistributor::new("B");
    a.push_lock(NOW + 3_600, 1);
    poller.set_distributors(vec![a.handle(), b.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for_each(&mut events, &[&resolved("A"), &resolved("B")]).await;

    poller.refresh().unwrap();
    wait_for_each(
        &mut events,
        &[
            &issued("A", RequeryReason::Manual),
            &issued("B", RequeryReason::Manual),
            &resolved("A"),
            &resolved("B"),
        ],
    )
    .await;

    assert_eq!(a.calls(), 2);
    assert_eq!(b.calls(), 2);
    // A manual refresh keeps the draw period.
    assert_eq!(poller.snapshot().draw_period, Some(period(NOW)));
    assert_eq!(poller.metrics().queries_issued, 4);
}

#[tokio::test]
async fn reactor_keeps_polling_through_clock_failures() {
    init_test_tracing();
    let clock = FlakyClock::at_seconds(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    a.set_fallback(Ok(Some(RawTimelock::new(NOW + 3_600, 1))));
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, resolved("A")).await;

    clock.set_failing(true);
    poller.refresh().unwrap();
    let failed = wait_for(&mut events, |e| matches!(e, PollerEvent::QueryFailed { .. })).await;
    assert_matches!(
        failed,
        PollerEvent::QueryFailed { error, next_poll_ms: 150_000, .. } if error.contains("Clock unavailable")
    );

    // The retry is scheduled from the last good reading.
    clock.set_failing(false);
    clock.sim().advance_ms(150_000);
    wait_for(&mut events, issued("A", RequeryReason::IntervalElapsed)).await;
    let event = wait_for(&mut events, resolved("A")).await;
    assert_matches!(
        event,
        PollerEvent::LockResolved { lock: Some(lock), .. } if lock.end_time_seconds == NOW + 3_601
    );
}

#[tokio::test]
async fn nothing_is_queried_before_a_draw_period_is_known() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut status = poller.subscribe_status();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.refresh().unwrap();

    let snapshot = wait_for_status(&mut status, |s| s.get("A").is_some()).await;
    assert_eq!(snapshot.get("A").unwrap().status, LockStatus::Loading);
    assert_eq!(snapshot.draw_period, None);
    clock.advance_secs(3_600);
    tokio::task::yield_now().await;
    assert_eq!(a.calls(), 0);

    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, issued("A", RequeryReason::DrawPeriodChanged)).await;
}

#[tokio::test]
async fn added_distributor_is_queried_without_requerying_others() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, resolved("A")).await;

    let b = ScriptedDistributor::new("B");
    b.push_lock(NOW + 10, 5);
    poller
        .set_distributors(vec![a.handle(), b.handle(), b.handle()])
        .unwrap();
    wait_for(&mut events, issued("B", RequeryReason::DistributorAdded)).await;
    wait_for(&mut events, resolved("B")).await;

    assert_eq!(a.calls(), 1);
    assert_eq!(b.calls(), 1);
}

#[tokio::test]
async fn removed_distributor_completion_never_writes_schedule() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    let gate = a.push_gated();
    let keep = ScriptedDistributor::new("K");
    poller
        .set_distributors(vec![a.handle(), keep.handle()])
        .unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, issued("A", RequeryReason::DrawPeriodChanged)).await;

    poller.set_distributors(vec![keep.handle()]).unwrap();
    wait_for(&mut events, |e| {
        matches!(e, PollerEvent::DistributorRemoved { distributor } if distributor.as_str() == "A")
    })
    .await;
    wait_for(&mut events, |e| {
        matches!(e, PollerEvent::StaleCompletionDiscarded { distributor } if distributor.as_str() == "A")
    })
    .await;

    // The abandoned query can no longer be resolved.
    assert!(gate.send(Ok(Some(RawTimelock::new(NOW + 60, 1)))).is_err());

    let snapshot = poller.snapshot();
    assert!(snapshot.get("A").is_none());
    assert!(snapshot.get("K").is_some());
    assert_eq!(poller.metrics().stale_discarded, 1);
}

#[tokio::test]
async fn period_change_supersedes_in_flight_query() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    let _gate = a.push_gated();
    a.push_lock(NOW + 90, 8);
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, issued("A", RequeryReason::DrawPeriodChanged)).await;

    poller.set_draw_period(period(NOW + 1)).unwrap();
    let stale = |e: &PollerEvent| matches!(e, PollerEvent::StaleCompletionDiscarded { .. });
    let found = wait_for_each(&mut events, &[&stale, &resolved("A")]).await;
    assert_matches!(
        &found[1],
        PollerEvent::LockResolved { lock: Some(lock), .. } if lock.draw_id == 8
    );
    assert_eq!(a.calls(), 2);
    assert_eq!(poller.metrics().stale_discarded, 1);
}

#[tokio::test]
async fn hung_query_times_out_and_falls_back_to_default() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let config = PollerConfig {
        query_timeout_ms: 10_000,
        ..PollerConfig::default()
    };
    let poller = DrawLockPoller::spawn(config, clock.clone()).unwrap();
    let mut events = poller.subscribe_events();

    let a = ScriptedDistributor::new("A");
    let _gate = a.push_gated();
    poller.set_distributors(vec![a.handle()]).unwrap();
    poller.set_draw_period(period(NOW)).unwrap();
    wait_for(&mut events, issued("A", RequeryReason::DrawPeriodChanged)).await;

    clock.advance_ms(10_000);
    let failed = wait_for(&mut events, |e| matches!(e, PollerEvent::QueryFailed { .. })).await;
    assert_matches!(
        failed,
        PollerEvent::QueryFailed { error, next_poll_ms: 150_000, .. } if error.contains("timed out")
    );
}

#[tokio::test]
async fn shutdown_rejects_further_commands() {
    init_test_tracing();
    let clock = clock_at(NOW);
    let poller = DrawLockPoller::spawn(PollerConfig::default(), clock).unwrap();
    assert!(!poller.is_stopped());

    poller.shutdown();
    assert!(poller.is_stopped());
    assert_eq!(poller.refresh(), Err(ServiceError::Stopped));
    assert_eq!(
        poller.set_draw_period(period(NOW)),
        Err(ServiceError::Stopped)
    );
}

#[tokio::test]
async fn invalid_config_is_rejected_at_spawn() {
    let config = PollerConfig {
        default_interval_ms: 0,
        ..PollerConfig::default()
    };
    assert!(DrawLockPoller::spawn(config, clock_at(NOW)).is_err());
}
