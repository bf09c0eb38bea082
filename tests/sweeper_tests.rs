
use std::sync::Arc;
use std::time::Duration as StdDuration;

use test_helpers::{
    memory_report_store, orchestrator_with, record, utc, FixedClock, MemoryJobStore,
    RecordingSink,
};

use chrono::Duration;

use crossloader::detector::StuckJobDetector;
use crossloader::job::CrossLoadStatus;
use crossloader::sweeper::{stuck_failure_message, StuckJobSweeper};

fn sweeper_with(
    store: Arc<MemoryJobStore>,
    sink: Arc<RecordingSink>,
    threshold_minutes: u64,
) -> StuckJobSweeper {
    let detector = StuckJobDetector::new(store, threshold_minutes);
    let (orchestrator, _) = orchestrator_with(sink, memory_report_store());
    StuckJobSweeper::new(
        detector,
        orchestrator,
        Arc::new(FixedClock(utc(2024, 6, 1, 12, 0, 0))),
        threshold_minutes,
        StdDuration::from_secs(3600),
    )
}

#[tokio::test]
async fn sweep_fails_each_stuck_job_in_detector_order() {
    let now = utc(2024, 6, 1, 12, 0, 0);
    let stale = Some(now - Duration::minutes(300));
    let store = MemoryJobStore::new(vec![
        record(1, CrossLoadStatus::MovedForProcessing, stale),
        record(2, CrossLoadStatus::MovedForProcessing, stale),
        record(3, CrossLoadStatus::MovedForProcessing, stale),
    ]);
    let sink = RecordingSink::new();
    let sweeper = sweeper_with(store, sink.clone(), 240);

    sweeper.run_once().await;

    assert_eq!(
        sink.calls(),
        vec![
            (1, CrossLoadStatus::Failed),
            (2, CrossLoadStatus::Failed),
            (3, CrossLoadStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn one_failing_notification_does_not_stop_the_rest() {
    let now = utc(2024, 6, 1, 12, 0, 0);
    let stale = Some(now - Duration::minutes(300));
    let store = MemoryJobStore::new(vec![
        record(1, CrossLoadStatus::MovedForProcessing, stale),
        record(2, CrossLoadStatus::MovedForProcessing, stale),
        record(3, CrossLoadStatus::MovedForProcessing, stale),
    ]);
    let sink = RecordingSink::failing_for(&[2]);
    let sweeper = sweeper_with(store, sink.clone(), 240);

    sweeper.run_once().await;

    // Job 2's sink call failed but jobs 1 and 3 were still attempted.
    assert_eq!(
        sink.calls(),
        vec![
            (1, CrossLoadStatus::Failed),
            (2, CrossLoadStatus::Failed),
            (3, CrossLoadStatus::Failed),
        ]
    );
}

#[tokio::test]
async fn fresh_jobs_are_left_alone() {
    let now = utc(2024, 6, 1, 12, 0, 0);
    let store = MemoryJobStore::new(vec![record(
        1,
        CrossLoadStatus::MovedForProcessing,
        Some(now - Duration::minutes(30)),
    )]);
    let sink = RecordingSink::new();
    let sweeper = sweeper_with(store, sink.clone(), 240);

    sweeper.run_once().await;

    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn detector_failure_ends_run_without_notifications() {
    let sink = RecordingSink::new();
    let sweeper = sweeper_with(MemoryJobStore::unavailable(), sink.clone(), 240);

    sweeper.run_once().await;

    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn synthetic_failure_references_threshold_and_job() {
    let sink = RecordingSink::new();
    let sweeper = sweeper_with(MemoryJobStore::new(Vec::new()), sink, 240);

    let message = sweeper.synthetic_failure(42);
    assert_eq!(message.job_id, 42);
    assert_eq!(message.external_job_id, "NA");
    assert!(!message.is_success());
    let reason = message.error_message.unwrap();
    assert!(reason.contains("240 minutes"));
    assert!(message.storage_container.is_none());
}

#[test]
fn failure_message_names_configured_timeout() {
    let message = stuck_failure_message(90);
    assert!(message.contains("has not changed state"));
    assert!(message.ends_with("90 minutes"));
}
