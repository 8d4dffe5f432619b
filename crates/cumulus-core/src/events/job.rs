//! Job lifecycle events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::job::JobKind;

/// Events describing a job's lifecycle, delivered to the realtime sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEvent {
    /// A job was accepted into a backend.
    Queued {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// The owning user, if any.
        user_id: Option<Uuid>,
        /// When the job was accepted.
        timestamp: DateTime<Utc>,
    },
    /// A worker began executing the job.
    Started {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// The attempt number, starting at 1.
        attempt: u32,
        /// When execution began.
        timestamp: DateTime<Utc>,
    },
    /// Intermediate completion percentage.
    Progress {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// Completion percentage, 0-100.
        percent: u8,
        /// When the observation was published.
        timestamp: DateTime<Utc>,
    },
    /// The job completed successfully.
    Completed {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// When the job finished.
        timestamp: DateTime<Utc>,
    },
    /// The job failed after its final attempt.
    Failed {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// Human-readable failure summary.
        error: String,
        /// When the job failed.
        timestamp: DateTime<Utc>,
    },
    /// The job was cancelled.
    Cancelled {
        /// The job kind.
        kind: JobKind,
        /// The job id.
        job_id: String,
        /// When the cancellation was recorded.
        timestamp: DateTime<Utc>,
    },
}

impl JobEvent {
    /// The `(kind, id)` pair this event refers to.
    pub fn job(&self) -> (JobKind, &str) {
        match self {
            Self::Queued { kind, job_id, .. }
            | Self::Started { kind, job_id, .. }
            | Self::Progress { kind, job_id, .. }
            | Self::Completed { kind, job_id, .. }
            | Self::Failed { kind, job_id, .. }
            | Self::Cancelled { kind, job_id, .. } => (*kind, job_id),
        }
    }
}
