//! Contract Test: One Sync Cycle
//!
//! This test verifies the fetch → compare → retry → report → persist cycle
//! of `SyncEngine::run_once()`.
//!
//! Constraints verified:
//! - Equal snapshots never trigger a diff or a write
//! - A difference is retried before it is trusted
//! - A spurious first attempt that matches on retry is not a change
//! - Store reads and writes have their own bounded retry
//! - Persistence failure is fatal and leaves the stored snapshot untouched
//! - `consecutive_match` refuses to confirm a flapping snapshot
//! - Dry runs report but never write

mod common;

use common::*;
use dnswatch_core::config::ConfirmPolicy;
use dnswatch_core::detector::ChangeKind;
use dnswatch_core::error::Error;
use dnswatch_core::table::render_records;
use dnswatch_core::{SyncEngine, SyncEvent, SyncOutcome};
use std::sync::Arc;

fn two_domains() -> Vec<dnswatch_core::Record> {
    vec![
        a_record("a.com", "1.1.1.1", "2016-01-01 00:00:00"),
        a_record("b.com", "2.2.2.2", "2016-01-01 00:00:00"),
    ]
}

#[tokio::test]
async fn matching_snapshot_reports_no_changes() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new(render_records(two_domains()));

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();

    assert_eq!(outcome, SyncOutcome::NoChanges { attempts: 1 });
    assert_eq!(provider.list_domains_calls(), 1);
    assert_eq!(store.read_calls(), 1);
    assert_eq!(store.write_calls(), 0, "Equal snapshots must not be written");
}

#[tokio::test]
async fn first_run_against_empty_store_persists_whole_table() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("");

    let (engine, mut events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();

    match outcome {
        SyncOutcome::Changed {
            report,
            location,
            persisted,
            attempts,
        } => {
            assert_eq!(attempts, 2, "A difference is retried before it is trusted");
            assert!(persisted);
            assert_eq!(location, store.location());
            assert_eq!(report.change_count(), 1);
            assert_eq!(report.comparison.entries[0].kind, ChangeKind::Added);
            assert_eq!(report.new_snapshot, render_records(two_domains()));
        }
        other => panic!("expected a change, got {:?}", other),
    }

    assert_eq!(store.write_calls(), 1);
    assert_eq!(store.text(), render_records(two_domains()));

    let events = drain_events(&mut events);
    assert_eq!(
        events,
        vec![
            SyncEvent::AttemptStarted {
                attempt: 1,
                max_attempts: 2
            },
            SyncEvent::SnapshotsDiffer { attempt: 1 },
            SyncEvent::AttemptStarted {
                attempt: 2,
                max_attempts: 2
            },
            SyncEvent::SnapshotsDiffer { attempt: 2 },
            SyncEvent::ChangeConfirmed {
                change_count: 1,
                attempts: 2
            },
            SyncEvent::SnapshotPersisted {
                location: store.location()
            },
        ]
    );
}

#[tokio::test]
async fn added_domain_is_reported_as_one_insertion() {
    let stored = vec![a_record("a.com", "1.1.1.1", "2016-01-01 00:00:00")];
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new(render_records(stored));

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();
    let SyncOutcome::Changed { report, .. } = outcome else {
        panic!("expected a change");
    };

    assert_eq!(report.change_count(), 1);
    let entry = &report.comparison.entries[0];
    assert_eq!(entry.kind, ChangeKind::Added);
    assert_eq!(entry.line, 3);
    assert!(entry.text.contains("b.com"));

    let summary = report.summary();
    assert!(summary.starts_with("found 1 changes to the DNS table:\n\nline 3 added:\n"));
    assert!(!summary.ends_with('\n'));
}

#[tokio::test]
async fn updated_at_change_counts_two() {
    let mut changed = two_domains();
    changed[1].updated_at = "2016-02-02 00:00:00".to_string();

    let provider = ScriptedProvider::fixed(changed);
    let store = MockSnapshotStore::new(render_records(two_domains()));

    let (engine, _events) =
        SyncEngine::new(Arc::new(provider), Box::new(store), fast_config()).unwrap();

    let SyncOutcome::Changed { report, .. } = engine.run_once().await.unwrap() else {
        panic!("expected a change");
    };

    assert_eq!(report.change_count(), 2);
    assert_eq!(report.comparison.entries[0].kind, ChangeKind::Deleted);
    assert_eq!(report.comparison.entries[1].kind, ChangeKind::Added);
}

#[tokio::test]
async fn spurious_first_attempt_is_not_a_change() {
    // First fetch misses b.com, the retry sees the stored table again
    let flaky = vec![a_record("a.com", "1.1.1.1", "2016-01-01 00:00:00")];
    let provider = ScriptedProvider::new(vec![flaky, two_domains()]);
    let store = MockSnapshotStore::new(render_records(two_domains()));

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();

    assert_eq!(outcome, SyncOutcome::NoChanges { attempts: 2 });
    assert_eq!(provider.list_domains_calls(), 2);
    assert_eq!(store.read_calls(), 2, "Each attempt re-reads the stored snapshot");
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn single_attempt_trusts_first_difference() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("");

    let mut config = fast_config();
    config.max_attempts = 1;

    let (engine, _events) =
        SyncEngine::new(Arc::new(provider.clone()), Box::new(store.clone()), config).unwrap();

    let outcome = engine.run_once().await.unwrap();
    assert!(outcome.is_changed());
    assert_eq!(outcome.attempts(), 1);
    assert_eq!(provider.list_domains_calls(), 1);
    assert_eq!(store.write_calls(), 1);
}

#[tokio::test]
async fn record_order_from_provider_does_not_matter() {
    let records = vec![
        record("MX", "a.com", "@", "mx.a.com", "t"),
        record("A", "a.com", "www", "1.1.1.1", "t"),
        record("A", "a.com", "@", "1.1.1.1", "t"),
    ];
    let mut reversed = records.clone();
    reversed.reverse();

    let provider = ScriptedProvider::new(vec![records.clone(), reversed]);
    let store = MockSnapshotStore::new(render_records(records));

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    // Cycle one serves the records as listed, cycle two the reversed one
    assert_eq!(
        engine.run_once().await.unwrap(),
        SyncOutcome::NoChanges { attempts: 1 }
    );
    assert_eq!(
        engine.run_once().await.unwrap(),
        SyncOutcome::NoChanges { attempts: 1 }
    );
    assert_eq!(provider.list_domains_calls(), 2);
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn store_read_is_retried() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new(render_records(two_domains())).failing_reads(1);

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();

    assert_eq!(outcome, SyncOutcome::NoChanges { attempts: 1 });
    assert_eq!(store.read_calls(), 2);
}

#[tokio::test]
async fn store_read_exhaustion_is_fatal() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("").failing_reads(2);

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let err = engine.run_once().await.unwrap_err();

    assert!(err.is_store(), "unexpected error: {}", err);
    assert!(err.to_string().contains("read failed after 2 attempts"));
    assert_eq!(store.read_calls(), 2);
    assert_eq!(store.write_calls(), 0, "Nothing is written when the cycle fails");
}

#[tokio::test]
async fn store_write_failure_is_fatal() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("old\n").failing_writes(10);

    let (engine, mut events) = SyncEngine::new(
        Arc::new(provider),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let err = engine.run_once().await.unwrap_err();

    assert!(err.is_store(), "unexpected error: {}", err);
    assert_eq!(store.write_calls(), 2, "Writes get the store retry budget");
    assert_eq!(store.text(), "old\n");

    let events = drain_events(&mut events);
    assert!(
        events
            .iter()
            .any(|e| matches!(e, SyncEvent::ChangeConfirmed { .. }))
    );
    assert!(
        !events
            .iter()
            .any(|e| matches!(e, SyncEvent::SnapshotPersisted { .. }))
    );
}

#[tokio::test]
async fn store_write_is_retried() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("").failing_writes(1);

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let outcome = engine.run_once().await.unwrap();

    assert!(outcome.is_changed());
    assert_eq!(store.write_calls(), 2);
    assert_eq!(store.text(), render_records(two_domains()));
}

#[tokio::test]
async fn domain_list_failure_is_fatal() {
    let provider = ScriptedProvider::fixed(two_domains()).with_failing_domain_list();
    let store = MockSnapshotStore::new("");

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        fast_config(),
    )
    .unwrap();

    let err = engine.run_once().await.unwrap_err();

    assert!(err.is_provider(), "unexpected error: {}", err);
    assert!(err.to_string().contains("domain list unavailable"));
    assert_eq!(provider.list_domains_calls(), 1, "Fetch failures are not retried");
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn dry_run_reports_without_writing() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("");

    let mut config = fast_config();
    config.dry_run = true;

    let (engine, mut events) =
        SyncEngine::new(Arc::new(provider), Box::new(store.clone()), config).unwrap();

    let outcome = engine.run_once().await.unwrap();

    match outcome {
        SyncOutcome::Changed {
            persisted,
            location,
            report,
            ..
        } => {
            assert!(!persisted);
            assert_eq!(location, store.location());
            assert_eq!(report.change_count(), 1);
        }
        other => panic!("expected a change, got {:?}", other),
    }

    assert_eq!(store.write_calls(), 0);
    assert_eq!(store.text(), "");
    assert!(
        !drain_events(&mut events)
            .iter()
            .any(|e| matches!(e, SyncEvent::SnapshotPersisted { .. }))
    );
}

#[tokio::test]
async fn consecutive_match_refuses_flapping_snapshot() {
    let v1 = vec![a_record("a.com", "1.1.1.1", "t1")];
    let v2 = vec![a_record("a.com", "2.2.2.2", "t2")];
    let provider = ScriptedProvider::new(vec![v1.clone(), v2.clone(), v1, v2]);
    let store = MockSnapshotStore::new("");

    let mut config = fast_config();
    config.max_attempts = 3;
    config.confirm_policy = ConfirmPolicy::ConsecutiveMatch;

    let (engine, _events) = SyncEngine::new(
        Arc::new(provider.clone()),
        Box::new(store.clone()),
        config,
    )
    .unwrap();

    let err = engine.run_once().await.unwrap_err();

    assert!(matches!(err, Error::Unstable(_)), "unexpected error: {}", err);
    assert_eq!(provider.list_domains_calls(), 3);
    assert_eq!(store.write_calls(), 0);
}

#[tokio::test]
async fn consecutive_match_confirms_repeated_snapshot() {
    let flaky = vec![a_record("a.com", "1.1.1.1", "2016-01-01 00:00:00")];
    let provider = ScriptedProvider::new(vec![flaky, two_domains(), two_domains()]);
    let store = MockSnapshotStore::new("");

    let mut config = fast_config();
    config.max_attempts = 3;
    config.confirm_policy = ConfirmPolicy::ConsecutiveMatch;

    let (engine, _events) =
        SyncEngine::new(Arc::new(provider), Box::new(store.clone()), config).unwrap();

    let outcome = engine.run_once().await.unwrap();

    assert!(outcome.is_changed());
    assert_eq!(outcome.attempts(), 3);
    assert_eq!(store.text(), render_records(two_domains()));
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let mut config = fast_config();
    config.max_attempts = 0;

    let result = SyncEngine::new(
        Arc::new(ScriptedProvider::fixed(Vec::new())),
        Box::new(MockSnapshotStore::new("")),
        config,
    );

    assert!(matches!(result, Err(Error::Config(_))));
}

#[tokio::test]
async fn dropped_event_receiver_does_not_block_cycle() {
    let provider = ScriptedProvider::fixed(two_domains());
    let store = MockSnapshotStore::new("");

    let mut config = fast_config();
    config.event_channel_capacity = 1;

    let (engine, events) =
        SyncEngine::new(Arc::new(provider), Box::new(store.clone()), config).unwrap();
    drop(events);

    assert!(engine.run_once().await.unwrap().is_changed());
    assert_eq!(store.write_calls(), 1);
}
