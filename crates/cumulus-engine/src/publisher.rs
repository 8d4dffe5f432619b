//! Progress publisher: relays job lifecycle and progress to the status
//! store and the realtime sink.
//!
//! All status-store failures here are logged and swallowed — a lagging
//! status record must never crash a worker or fail a job
//! (`Persistence` policy).

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use cumulus_core::error::AppError;
use cumulus_core::events::job::JobEvent;
use cumulus_core::traits::sink::ProgressSink;
use cumulus_core::traits::status_store::JobStatusStore;
use cumulus_core::types::job::{JobKind, JobRecord, JobStatus};

/// Cap on the human-readable error summary surfaced to users.
const ERROR_SUMMARY_MAX: usize = 300;

/// Fans job lifecycle updates out to the status store and the realtime
/// sink, clamping progress to be monotone per job.
#[derive(Debug)]
pub struct ProgressPublisher {
    /// Status persistence.
    status: Arc<dyn JobStatusStore>,
    /// Realtime event sink.
    sink: Arc<dyn ProgressSink>,
    /// Last published percentage per live job. Tool restarts (internal
    /// retries) may locally reset the tool's own percentage; publishing
    /// must never regress below a plateaued value.
    last: DashMap<String, u8>,
}

impl ProgressPublisher {
    /// Create a new publisher.
    pub fn new(status: Arc<dyn JobStatusStore>, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            status,
            sink,
            last: DashMap::new(),
        }
    }

    fn key(kind: JobKind, id: &str) -> String {
        format!("{kind}:{id}")
    }

    /// Announce acceptance of a job.
    pub async fn queued(&self, record: &JobRecord) {
        self.sink
            .publish(JobEvent::Queued {
                kind: record.kind,
                job_id: record.id.clone(),
                user_id: record.payload.user_id,
                timestamp: Utc::now(),
            })
            .await;
    }

    /// Record the start of an execution attempt.
    ///
    /// Returns `false` when the job must not run (cancelled or already
    /// terminal); workers skip execution in that case. A status store
    /// that cannot be read does not block execution — visibility may
    /// lag, work continues.
    pub async fn begin_attempt(&self, kind: JobKind, id: &str, attempt: u32) -> bool {
        match self.status.get(kind, id).await {
            Ok(Some(record)) if record.status.is_terminal() => return false,
            Ok(None) => return false,
            Ok(Some(_)) => {}
            Err(e) => {
                tracing::warn!(kind = %kind, job_id = %id, error = %e, "Status read failed at attempt start");
            }
        }

        // First attempt transitions Queued -> Processing; retries are
        // already Processing and the guard ignores the no-op.
        if let Err(e) = self
            .status
            .mark(kind, id, JobStatus::Processing, None)
            .await
        {
            tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to mark job processing");
        }
        if let Err(e) = self.status.set_attempts(kind, id, attempt).await {
            tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to record attempt");
        }

        self.sink
            .publish(JobEvent::Started {
                kind,
                job_id: id.to_string(),
                attempt,
                timestamp: Utc::now(),
            })
            .await;
        true
    }

    /// Consume a job's progress channel until the executor closes it,
    /// publishing monotone non-decreasing percentages.
    pub async fn pump(&self, kind: JobKind, id: String, mut rx: mpsc::Receiver<u8>) {
        let key = Self::key(kind, &id);
        while let Some(percent) = rx.recv().await {
            let percent = percent.min(99);
            let plateau = self.last.get(&key).map(|v| *v).unwrap_or(0);
            if percent <= plateau {
                continue;
            }
            self.last.insert(key.clone(), percent);

            if let Err(e) = self.status.set_progress(kind, &id, percent).await {
                tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to persist progress");
            }
            self.sink
                .publish(JobEvent::Progress {
                    kind,
                    job_id: id.clone(),
                    percent,
                    timestamp: Utc::now(),
                })
                .await;
        }
    }

    /// Record a verified-successful completion (progress becomes 100).
    pub async fn completed(&self, kind: JobKind, id: &str) {
        self.last.remove(&Self::key(kind, id));
        match self.status.mark(kind, id, JobStatus::Completed, None).await {
            Ok(true) => {
                self.sink
                    .publish(JobEvent::Completed {
                        kind,
                        job_id: id.to_string(),
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            // Cancelled in flight; the terminal guard already kept the
            // cancelled status, so no completion event goes out.
            Ok(false) => {
                tracing::debug!(kind = %kind, job_id = %id, "Completion discarded by terminal guard");
            }
            Err(e) => {
                tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to mark job completed");
            }
        }
    }

    /// Record a terminal failure with a human-readable summary.
    pub async fn failed(&self, kind: JobKind, id: &str, error: &AppError) {
        self.last.remove(&Self::key(kind, id));
        let summary = error_summary(error);
        match self
            .status
            .mark(kind, id, JobStatus::Failed, Some(summary.clone()))
            .await
        {
            Ok(true) => {
                self.sink
                    .publish(JobEvent::Failed {
                        kind,
                        job_id: id.to_string(),
                        error: summary,
                        timestamp: Utc::now(),
                    })
                    .await;
            }
            Ok(false) => {
                tracing::debug!(kind = %kind, job_id = %id, "Failure discarded by terminal guard");
            }
            Err(e) => {
                tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to mark job failed");
            }
        }
    }

    /// Announce a cancellation already recorded in the status store.
    pub async fn cancelled(&self, kind: JobKind, id: &str) {
        self.last.remove(&Self::key(kind, id));
        self.sink
            .publish(JobEvent::Cancelled {
                kind,
                job_id: id.to_string(),
                timestamp: Utc::now(),
            })
            .await;
    }
}

/// Reduce an execution error to a bounded, user-presentable summary —
/// never the raw diagnostic dump.
fn error_summary(error: &AppError) -> String {
    let mut summary = error.to_string();
    if summary.len() > ERROR_SUMMARY_MAX {
        let mut cut = ERROR_SUMMARY_MAX;
        while !summary.is_char_boundary(cut) {
            cut -= 1;
        }
        summary.truncate(cut);
        summary.push('…');
    }
    summary
}
