//! Submission admission: validation, idempotency, rate limiting.

use uuid::Uuid;

use cumulus_core::config::rate_limit::RateLimitConfig;
use cumulus_core::error::ErrorKind;
use cumulus_core::types::job::{JobKind, JobStatus};
use cumulus_engine::engine::SubmitRequest;

use crate::helpers::{build_harness, HarnessOptions};

#[tokio::test]
async fn test_invalid_payload_is_rejected_before_admission() {
    let harness = build_harness(HarnessOptions::default());

    let mut request = harness.request("job-1", JobKind::Thumbnail);
    request.payload.output_path = "   ".to_string();

    let err = harness.engine.submit(request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPayload);
    let err = harness.engine.status(JobKind::Thumbnail, "job-1").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn test_resubmitting_live_id_coalesces() {
    let harness = build_harness(HarnessOptions {
        script: "sleep 0.5; printf data > {output}".to_string(),
        ..Default::default()
    });

    let first = harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    let second = harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);

    let record = harness.wait_terminal(JobKind::Thumbnail, "job-1").await;
    // A coalesced duplicate must not run the tool twice.
    assert_eq!(record.attempts, 1);
}

#[tokio::test]
async fn test_resubmitting_terminal_id_runs_again() {
    let harness = build_harness(HarnessOptions::default());

    harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    let first = harness.wait_terminal(JobKind::Thumbnail, "job-1").await;
    assert_eq!(first.status, JobStatus::Completed);

    let resubmitted = harness
        .engine
        .submit(harness.request("job-1", JobKind::Thumbnail))
        .await
        .unwrap();
    assert_eq!(resubmitted.status, JobStatus::Queued);
    assert_eq!(resubmitted.progress, 0);

    let second = harness.wait_terminal(JobKind::Thumbnail, "job-1").await;
    assert_eq!(second.status, JobStatus::Completed);
}

#[tokio::test]
async fn test_omitted_id_gets_a_fresh_one() {
    let harness = build_harness(HarnessOptions::default());

    let mut request = harness.request("ignored", JobKind::Thumbnail);
    request.id = None;
    let first = harness.engine.submit(request).await.unwrap();

    let mut request = harness.request("ignored-2", JobKind::Thumbnail);
    request.id = None;
    let second = harness.engine.submit(request).await.unwrap();

    assert_ne!(first.id, second.id);
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_submissions() {
    let harness = build_harness(HarnessOptions {
        rate_limit: RateLimitConfig {
            enabled: true,
            window_seconds: 3_600,
            max_per_window: 2,
        },
        ..Default::default()
    });
    let user = Uuid::new_v4();

    for id in ["job-1", "job-2"] {
        let mut request = harness.request(id, JobKind::Thumbnail);
        request.payload.user_id = Some(user);
        harness.engine.submit(request).await.unwrap();
    }

    let mut request = harness.request("job-3", JobKind::Thumbnail);
    request.payload.user_id = Some(user);
    let err = harness.engine.submit(request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::RateLimited);

    // System-issued jobs are exempt.
    let request = harness.request("job-4", JobKind::Thumbnail);
    harness.engine.submit(request).await.unwrap();
}

#[tokio::test]
async fn test_blank_id_is_invalid() {
    let harness = build_harness(HarnessOptions::default());

    let request = SubmitRequest {
        id: Some("   ".to_string()),
        ..harness.request("unused", JobKind::Thumbnail)
    };
    let err = harness.engine.submit(request).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidPayload);
}
