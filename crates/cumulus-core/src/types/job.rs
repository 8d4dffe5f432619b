//! The job model: kinds, payloads, status state machine, and records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::result::AppResult;

/// Category of background media work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    /// Still-image or video poster-frame thumbnail generation.
    #[serde(rename = "thumbnail")]
    Thumbnail,
    /// Video transcoding to a streamable rendition.
    #[serde(rename = "video-transcode")]
    VideoTranscode,
    /// Audio rendering/transcoding.
    #[serde(rename = "audio-render")]
    AudioRender,
    /// Office-document-to-PDF preview conversion.
    #[serde(rename = "document-convert")]
    DocumentConvert,
}

impl JobKind {
    /// All job kinds, in a stable order.
    pub const ALL: [JobKind; 4] = [
        JobKind::Thumbnail,
        JobKind::VideoTranscode,
        JobKind::AudioRender,
        JobKind::DocumentConvert,
    ];

    /// The stable string key for this kind, used in queue names,
    /// storage keys, and configuration tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Thumbnail => "thumbnail",
            Self::VideoTranscode => "video-transcode",
            Self::AudioRender => "audio-render",
            Self::DocumentConvert => "document-convert",
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "thumbnail" => Ok(Self::Thumbnail),
            "video-transcode" => Ok(Self::VideoTranscode),
            "audio-render" => Ok(Self::AudioRender),
            "document-convert" => Ok(Self::DocumentConvert),
            other => Err(AppError::invalid_payload(format!(
                "Unknown job kind '{other}'"
            ))),
        }
    }
}

/// Lifecycle state of a job.
///
/// `Queued -> Processing -> {Completed | Failed | Cancelled}`. Terminal
/// states are final; internal retries on the durable backend stay within
/// `Processing` from the caller's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Accepted into a backend's pending structure, not yet started.
    Queued,
    /// A worker has begun execution.
    Processing,
    /// The final attempt succeeded.
    Completed,
    /// Attempts exhausted, or a single fallback attempt failed.
    Failed,
    /// Cancelled before start, or flagged while in flight.
    Cancelled,
}

impl JobStatus {
    /// Whether this status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match self {
            Self::Queued => matches!(
                next,
                JobStatus::Processing | JobStatus::Failed | JobStatus::Cancelled
            ),
            Self::Processing => next.is_terminal(),
            // Terminal states never transition out.
            Self::Completed | Self::Failed | Self::Cancelled => false,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// Kind-specific job parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobPayload {
    /// Path to the source file.
    pub input_path: String,
    /// Path where the output artifact must be written.
    pub output_path: String,
    /// The owning user, if any. `None` means a system-issued job,
    /// which bypasses the rate limiter.
    #[serde(default)]
    pub user_id: Option<Uuid>,
    /// Quality/format options.
    #[serde(default)]
    pub options: JobOptions,
}

/// Optional quality and format parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobOptions {
    /// Output format hint (e.g. `"webm"`, `"pdf"`, `"webp"`).
    #[serde(default)]
    pub format: Option<String>,
    /// Quality setting, tool-specific scale.
    #[serde(default)]
    pub quality: Option<u32>,
    /// Known media duration in seconds, used to turn ffmpeg time
    /// markers into a percentage.
    #[serde(default)]
    pub duration_seconds: Option<f64>,
}

impl JobPayload {
    /// Validate the payload for submission. Rejected payloads never
    /// enter a queue.
    pub fn validate(&self) -> AppResult<()> {
        if self.input_path.trim().is_empty() {
            return Err(AppError::invalid_payload("input_path must not be empty"));
        }
        if self.output_path.trim().is_empty() {
            return Err(AppError::invalid_payload("output_path must not be empty"));
        }
        Ok(())
    }
}

/// The persisted record of a job's lifecycle.
///
/// Kept in the status store independently of which backend executed the
/// job, so status queries behave identically in both deployment modes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Caller-assigned stable key, unique per kind.
    pub id: String,
    /// The category of work.
    pub kind: JobKind,
    /// Kind-specific parameters.
    pub payload: JobPayload,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Completion percentage, 0-100, monotone while processing.
    pub progress: u8,
    /// Execution attempts so far.
    pub attempts: u32,
    /// Maximum attempts for this job.
    pub max_attempts: u32,
    /// Last failure reason; present only when failed.
    pub error: Option<String>,
    /// When the job was submitted.
    pub created_at: DateTime<Utc>,
    /// When the record last changed.
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a freshly queued record.
    pub fn new(kind: JobKind, id: impl Into<String>, payload: JobPayload, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            kind,
            payload,
            status: JobStatus::Queued,
            progress: 0,
            attempts: 0,
            max_attempts,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The composite storage key `kind:id`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    /// Project the externally visible snapshot.
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            status: self.status,
            progress: self.progress,
            attempts: self.attempts,
            error: self.error.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Externally visible projection of a [`JobRecord`], returned by status
/// queries and carried on realtime events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSnapshot {
    /// Caller-assigned job id.
    pub id: String,
    /// The category of work.
    pub kind: JobKind,
    /// Current lifecycle state.
    pub status: JobStatus,
    /// Completion percentage.
    pub progress: u8,
    /// Execution attempts so far.
    pub attempts: u32,
    /// Last failure reason, if failed.
    pub error: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}
