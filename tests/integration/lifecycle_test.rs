//! Full job lifecycle: queued, processing, progress, terminal outcome.

use cumulus_core::error::ErrorKind;
use cumulus_core::events::job::JobEvent;
use cumulus_core::types::job::{JobKind, JobStatus};

use crate::helpers::{build_harness, HarnessOptions};

#[tokio::test]
async fn test_job_runs_to_completion_with_progress() {
    let mut harness = build_harness(HarnessOptions {
        script: "echo 25%; echo 80%; printf data > {output}".to_string(),
        ..Default::default()
    });

    let accepted = harness
        .engine
        .submit(harness.request("job-1", JobKind::VideoTranscode))
        .await
        .unwrap();
    assert_eq!(accepted.status, JobStatus::Queued);
    assert_eq!(accepted.progress, 0);

    let record = harness.wait_terminal(JobKind::VideoTranscode, "job-1").await;
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100);
    assert_eq!(record.attempts, 1);
    assert!(record.error.is_none());
    assert!(std::fs::metadata(&record.payload.output_path).unwrap().len() > 0);

    // Give the sink a beat to observe the completion event.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let events = harness.drain_events();
    assert!(events.iter().any(|e| matches!(e, JobEvent::Queued { .. })));
    let started = events
        .iter()
        .position(|e| matches!(e, JobEvent::Started { attempt: 1, .. }))
        .expect("started event");
    let completed = events
        .iter()
        .position(|e| matches!(e, JobEvent::Completed { .. }))
        .expect("completed event");
    assert!(started < completed);

    let percents: Vec<u8> = events
        .iter()
        .filter_map(|e| match e {
            JobEvent::Progress { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(!percents.is_empty());
    assert!(percents.windows(2).all(|w| w[0] < w[1]), "{percents:?}");
    assert!(percents.iter().all(|p| *p < 100));
}

#[tokio::test]
async fn test_failing_tool_marks_job_failed() {
    let harness = build_harness(HarnessOptions {
        script: "echo codec not supported >&2; exit 1".to_string(),
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();

    let record = harness.wait_terminal(JobKind::Thumbnail, "job-1").await;
    assert_eq!(record.status, JobStatus::Failed);
    let error = record.error.expect("failure reason recorded");
    assert!(error.contains("codec not supported"), "{error}");
}

#[tokio::test]
async fn test_hanging_tool_times_out_and_fails() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 30".to_string(),
        timeout_seconds: 1,
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::AudioRender))
        .await
        .unwrap();

    let record = harness.wait_terminal(JobKind::AudioRender, "job-1").await;
    assert_eq!(record.status, JobStatus::Failed);
    let error = record.error.expect("timeout recorded");
    assert!(error.contains(&ErrorKind::Timeout.to_string()), "{error}");
}

#[tokio::test]
async fn test_silent_success_without_artifact_fails() {
    let harness = build_harness(HarnessOptions {
        script: "true".to_string(),
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::DocumentConvert))
        .await
        .unwrap();

    let record = harness.wait_terminal(JobKind::DocumentConvert, "job-1").await;
    assert_eq!(record.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_status_reflects_snapshot_fields() {
    let harness = build_harness(HarnessOptions::default());

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    harness.wait_terminal(JobKind::Thumbnail, "job-1").await;

    let snapshot = harness
        .engine
        .status(JobKind::Thumbnail, "job-1")
        .await
        .unwrap();
    assert_eq!(snapshot.id, "job-1");
    assert_eq!(snapshot.kind, JobKind::Thumbnail);
    assert_eq!(snapshot.status, JobStatus::Completed);
    assert!(snapshot.updated_at >= snapshot.created_at);
}
