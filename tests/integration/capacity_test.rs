//! Admission capacity: the fallback backend's pending cap and
//! per-kind concurrency ceiling.

use cumulus_core::config::fallback::FallbackConfig;
use cumulus_core::error::ErrorKind;
use cumulus_core::types::job::{JobKind, JobStatus};

use crate::helpers::{build_harness, HarnessOptions};

#[tokio::test]
async fn test_queue_full_rejection_leaves_no_trace() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 1".to_string(),
        fallback: FallbackConfig {
            default_concurrency: 1,
            pending_cap: 2,
            ..Default::default()
        },
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    harness
        .engine
        .submit(harness.request("job-2", JobKind::Thumbnail))
        .await
        .unwrap();

    let err = harness
        .engine
        .submit(harness.request("job-3", JobKind::Thumbnail))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QueueFull);

    // The rejected submission must not exist in the status store.
    let err = harness.engine.status(JobKind::Thumbnail, "job-3").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_kinds_have_independent_capacity() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 1".to_string(),
        fallback: FallbackConfig {
            default_concurrency: 1,
            pending_cap: 1,
            ..Default::default()
        },
        ..Default::default()
    });

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    let err = harness
        .engine
        .submit(harness.request("job-2", JobKind::Thumbnail))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::QueueFull);

    // A different kind has its own cap.
    harness
        .engine
        .submit(harness.request("job-3", JobKind::AudioRender))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_concurrency_ceiling_and_stats() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 0.5; printf data > {output}".to_string(),
        fallback: FallbackConfig {
            default_concurrency: 2,
            pending_cap: 10,
            ..Default::default()
        },
        ..Default::default()
    });

    for id in ["job-1", "job-2", "job-3"] {
        harness
            .engine
            .submit(harness.request(id, JobKind::Thumbnail))
            .await
            .unwrap();
    }

    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    let stats = harness.engine.stats().await.unwrap();
    let backend = stats.backend.expect("backend present");
    assert_eq!(backend.backend, "fallback");
    assert_eq!(backend.active, 2, "only two slots per kind");
    assert_eq!(backend.pending, 1);
    assert_eq!(stats.counts.processing, 2);
    assert_eq!(stats.counts.queued, 1);

    for id in ["job-1", "job-2", "job-3"] {
        let record = harness.wait_terminal(JobKind::Thumbnail, id).await;
        assert_eq!(record.status, JobStatus::Completed);
    }

    let stats = harness.engine.stats().await.unwrap();
    assert_eq!(stats.counts.completed, 3);
    assert_eq!(stats.backend.unwrap().active, 0);
}
