//! Live aggregator integration tests
//!
//! Drives the aggregator through full broadcasts against a store that can be made to fail

use std::sync::Arc;

use joke_meter::db::SummaryKind;
use joke_meter::{
    EventMeta, EventOutcome, IgnoreReason, LiveAggregator, SessionStatus, SessionStore, Transition,
    replay,
};
use tokio_test::assert_ok;

mod common;
use common::{FlakyStore, at, live_session};

fn meta(id: &str, posted_at: i64) -> EventMeta {
    EventMeta {
        id: id.to_string(),
        posted_at,
        is_self: false,
    }
}

#[tokio::test]
async fn test_full_broadcast() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    assert_eq!(agg.on_session_observed(None, None).await.transition, Transition::Idle);
    assert_eq!(
        agg.on_session_observed(Some(live_session("s1")), None).await.transition,
        Transition::Started
    );

    for (id, posted_at, text) in [
        ("a", at(0, 5), "+2 lol"),
        ("b", at(0, 30), "+2"),
        ("c", at(1, 0), "-2 groan"),
        ("d", at(2, 10), "+2"),
    ] {
        assert!(agg.on_event(text, meta(id, posted_at)).await.is_recorded());
    }

    let tick = agg.on_session_observed(Some(live_session("s1")), None).await;
    assert_eq!(tick.transition, Transition::Continued);
    assert_eq!(tick.stats.unwrap().total, 4);

    let end = agg.on_session_observed(None, None).await;
    assert_eq!(end.transition, Transition::Ended);
    assert!(end.is_ok());

    let stats = end.stats.unwrap();
    assert_eq!(stats.total, 4);
    assert_eq!(stats.min, -2);
    assert_eq!(stats.max, 6);
    assert_eq!(stats.running_high, 4);
    assert_eq!(stats.running_low, 0);
    let series: Vec<(i64, i64)> = stats.series.iter().map(|p| (p.interval, p.score)).collect();
    assert_eq!(series, vec![(0, 4), (1, 2), (2, 4)]);

    let session = assert_ok!(store.load_session("s1")).unwrap();
    assert_eq!(session.status, SessionStatus::Ended);

    let summary = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    assert_eq!(summary.stats, stats);
    assert_eq!(summary.event_count, 4);
    assert_eq!(assert_ok!(store.load_events("s1")).len(), 4);

    assert!(agg.session_id().await.is_none());
    assert_eq!(agg.buffered().await, 0);
}

#[tokio::test]
async fn test_end_runs_exactly_one_final_pass() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    agg.on_session_observed(Some(live_session("s1")), None).await;
    agg.on_event("+2", meta("a", at(0, 1))).await;
    agg.on_session_observed(Some(live_session("s1")), None).await;
    let before = agg.scoring_passes().await;

    // no new events since the last tick
    agg.on_session_observed(None, None).await;
    assert_eq!(agg.scoring_passes().await, before + 1);

    // already detached, nothing more to score
    agg.on_session_observed(None, None).await;
    assert_eq!(agg.scoring_passes().await, before + 1);
}

#[tokio::test]
async fn test_failed_start_is_retried_on_continue() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    store.set_failing(true);
    let start = agg.on_session_observed(Some(live_session("s1")), None).await;
    assert_eq!(start.transition, Transition::Started);
    assert!(!start.is_ok());
    assert_eq!(agg.session_id().await.as_deref(), Some("s1"));
    assert!(assert_ok!(store.load_session("s1")).is_none());

    // buffered in memory even though the log write fails
    match agg.on_event("+2", meta("a", at(0, 1))).await {
        EventOutcome::Recorded { persist_error, .. } => assert!(persist_error.is_some()),
        EventOutcome::Ignored(reason) => panic!("unexpected ignore: {reason:?}"),
    }
    assert_eq!(agg.buffered().await, 1);

    store.set_failing(false);
    let tick = agg.on_session_observed(Some(live_session("s1")), None).await;
    assert_eq!(tick.transition, Transition::Continued);
    assert!(tick.is_ok());
    assert!(assert_ok!(store.load_session("s1")).is_some());

    let summary = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    assert_eq!(summary.stats.total, 2);
}

#[tokio::test]
async fn test_failed_end_stays_attached_and_retries() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    agg.on_session_observed(Some(live_session("s1")), None).await;
    agg.on_event("-2", meta("a", at(0, 1))).await;

    store.set_failing(true);
    let failed = agg.on_session_observed(None, None).await;
    assert_eq!(failed.transition, Transition::Ended);
    assert!(failed.error.is_some());
    assert_eq!(agg.session_id().await.as_deref(), Some("s1"));
    assert_eq!(agg.buffered().await, 1);

    store.set_failing(false);
    let retried = agg.on_session_observed(None, None).await;
    assert_eq!(retried.transition, Transition::Ended);
    assert!(retried.is_ok());
    assert!(agg.session_id().await.is_none());

    let summary = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    assert_eq!(summary.stats.total, -2);
    assert_eq!(summary.stats.running_low, -2);
}

#[tokio::test]
async fn test_new_session_starts_with_empty_buffer() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    agg.on_session_observed(Some(live_session("s1")), None).await;
    agg.on_event("+2", meta("a", at(0, 1))).await;
    agg.on_session_observed(None, None).await;

    agg.on_session_observed(Some(live_session("s2")), None).await;
    assert_eq!(agg.buffered().await, 0);

    // IDs are deduplicated per session
    assert!(agg.on_event("+2", meta("a", at(0, 2))).await.is_recorded());
    assert!(matches!(
        agg.on_event("+2", meta("a", at(0, 2))).await,
        EventOutcome::Ignored(IgnoreReason::Duplicate)
    ));
    assert_eq!(assert_ok!(store.load_events("s2")).len(), 1);
    assert_eq!(assert_ok!(store.load_events("s1")).len(), 1);
}

#[tokio::test]
async fn test_failed_log_write_is_retried_before_scoring() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    agg.on_session_observed(Some(live_session("s1")), None).await;

    store.set_failing(true);
    match agg.on_event("+2", meta("a", at(0, 10))).await {
        EventOutcome::Recorded { persist_error, .. } => assert!(persist_error.is_some()),
        EventOutcome::Ignored(reason) => panic!("unexpected ignore: {reason:?}"),
    }
    store.set_failing(false);

    assert!(agg.on_event("+2", meta("b", at(0, 20))).await.is_recorded());
    assert_eq!(assert_ok!(store.load_events("s1")).len(), 1);

    let tick = agg.on_session_observed(Some(live_session("s1")), None).await;
    assert!(tick.is_ok());
    assert_eq!(assert_ok!(store.load_events("s1")).len(), 2);

    let end = agg.on_session_observed(None, None).await;
    assert!(end.is_ok());

    let live = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    let replayed = assert_ok!(replay(store.as_ref(), "s1"));
    assert_eq!(live.stats.total, 4);
    assert_eq!(replayed.summary.stats, live.stats);
    assert_eq!(replayed.summary.event_count, live.event_count);
}

#[tokio::test]
async fn test_end_waits_for_complete_event_log() {
    let store = FlakyStore::new();
    let agg = LiveAggregator::new(store.clone());

    agg.on_session_observed(Some(live_session("s1")), None).await;
    assert!(agg.on_event("-2", meta("a", at(0, 5))).await.is_recorded());

    store.set_failing(true);
    agg.on_event("+2", meta("b", at(1, 5))).await;
    let failed = agg.on_session_observed(None, None).await;
    assert_eq!(failed.transition, Transition::Ended);
    assert!(failed.error.is_some());
    assert_eq!(agg.session_id().await.as_deref(), Some("s1"));

    let session = assert_ok!(store.load_session("s1")).unwrap();
    assert_eq!(session.status, SessionStatus::Live);
    assert_eq!(assert_ok!(store.load_events("s1")).len(), 1);

    store.set_failing(false);
    let retried = agg.on_session_observed(None, None).await;
    assert!(retried.is_ok());
    assert!(agg.session_id().await.is_none());

    assert_eq!(assert_ok!(store.load_events("s1")).len(), 2);
    let session = assert_ok!(store.load_session("s1")).unwrap();
    assert_eq!(session.status, SessionStatus::Ended);

    let live = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    let replayed = assert_ok!(replay(store.as_ref(), "s1"));
    assert_eq!(live.stats.total, 0);
    assert_eq!(replayed.summary.stats, live.stats);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_events_and_ticks() {
    const TASKS: usize = 8;
    const PER_TASK: usize = 50;

    let store = FlakyStore::new();
    let agg = Arc::new(LiveAggregator::new(store.clone()));
    agg.on_session_observed(Some(live_session("s1")), None).await;

    let mut handles = Vec::new();
    for task in 0..TASKS {
        let agg = Arc::clone(&agg);
        handles.push(tokio::spawn(async move {
            for n in 0..PER_TASK {
                let text = if n % 3 == 0 { "-2" } else { "+2" };
                let second = i64::try_from(n).unwrap();
                let id = format!("t{task}-{n}");
                assert!(agg.on_event(text, meta(&id, at(0, second))).await.is_recorded());
                tokio::task::yield_now().await;
            }
            // resent by a reconnecting client
            let resent = agg.on_event("+2", meta(&format!("t{task}-0"), at(0, 0))).await;
            assert!(matches!(resent, EventOutcome::Ignored(IgnoreReason::Duplicate)));
        }));
    }

    let ticker = {
        let agg = Arc::clone(&agg);
        tokio::spawn(async move {
            for _ in 0..20 {
                let tick = agg.on_session_observed(Some(live_session("s1")), None).await;
                assert_eq!(tick.transition, Transition::Continued);
                assert!(tick.is_ok());
                tokio::task::yield_now().await;
            }
        })
    };

    for handle in handles {
        handle.await.unwrap();
    }
    ticker.await.unwrap();

    let end = agg.on_session_observed(None, None).await;
    assert!(end.is_ok());

    // 17 of every 50 are negative: (33 - 17) * 2 per task
    let expected_total = 32 * i64::try_from(TASKS).unwrap();
    let live = assert_ok!(store.load_summary("s1", SummaryKind::Live)).unwrap();
    assert_eq!(live.event_count, TASKS * PER_TASK);
    assert_eq!(live.stats.total, expected_total);
    assert_eq!(assert_ok!(store.load_events("s1")).len(), TASKS * PER_TASK);

    let replayed = assert_ok!(replay(store.as_ref(), "s1"));
    assert_eq!(replayed.summary.stats.total, expected_total);
}
