//! Cancellation semantics: queued jobs never run; in-flight jobs keep
//! their cancelled status regardless of the worker's outcome.

use cumulus_core::config::fallback::FallbackConfig;
use cumulus_core::events::job::JobEvent;
use cumulus_core::types::job::{JobKind, JobStatus};

use crate::helpers::{build_harness, HarnessOptions};

#[tokio::test]
async fn test_cancel_queued_job_never_executes() {
    // One slot, held by a slow job; the second job stays queued.
    let mut harness = build_harness(HarnessOptions {
        script: "sleep 0.5; printf data > {output}".to_string(),
        fallback: FallbackConfig {
            default_concurrency: 1,
            pending_cap: 10,
            ..Default::default()
        },
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("blocker", JobKind::Thumbnail))
        .await
        .unwrap();
    let victim = harness.request("victim", JobKind::Thumbnail);
    let victim_output = victim.payload.output_path.clone();
    harness.engine.submit(victim).await.unwrap();

    assert!(harness.engine.cancel(JobKind::Thumbnail, "victim").await.unwrap());

    let record = harness.wait_terminal(JobKind::Thumbnail, "victim").await;
    assert_eq!(record.status, JobStatus::Cancelled);
    assert_eq!(record.attempts, 0);

    // Let the blocker finish, then confirm the victim never produced
    // anything.
    harness.wait_terminal(JobKind::Thumbnail, "blocker").await;
    assert!(!std::path::Path::new(&victim_output).exists());

    let events = harness.drain_events();
    assert!(events
        .iter()
        .any(|e| matches!(e, JobEvent::Cancelled { job_id, .. } if job_id == "victim")));
    assert!(!events
        .iter()
        .any(|e| matches!(e, JobEvent::Started { job_id, .. } if job_id == "victim")));
}

#[tokio::test]
async fn test_cancel_processing_job_wins_over_completion() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 0.4; printf data > {output}".to_string(),
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::VideoTranscode))
        .await
        .unwrap();

    // Wait for the job to actually start.
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    loop {
        let snapshot = harness
            .engine
            .status(JobKind::VideoTranscode, "job-1")
            .await
            .unwrap();
        if snapshot.status == JobStatus::Processing {
            break;
        }
        assert!(std::time::Instant::now() < deadline, "job never started");
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert!(harness
        .engine
        .cancel(JobKind::VideoTranscode, "job-1")
        .await
        .unwrap());

    // Give the worker time to finish; the terminal guard must discard
    // its completion.
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;
    let record = harness.wait_terminal(JobKind::VideoTranscode, "job-1").await;
    assert_eq!(record.status, JobStatus::Cancelled);
    assert_ne!(record.progress, 100);
}

#[tokio::test]
async fn test_cancel_terminal_job_is_refused() {
    let harness = build_harness(HarnessOptions::default());

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    harness.wait_terminal(JobKind::Thumbnail, "job-1").await;

    assert!(!harness.engine.cancel(JobKind::Thumbnail, "job-1").await.unwrap());
    let record = harness
        .engine
        .status(JobKind::Thumbnail, "job-1")
        .await
        .unwrap();
    assert_eq!(record.status, JobStatus::Completed);
}
