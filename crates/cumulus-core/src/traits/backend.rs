//! Queue backend trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::job::{JobKind, JobRecord};

/// Backend-level queue statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendStats {
    /// Backend name (`"durable"` or `"fallback"`).
    pub backend: &'static str,
    /// Jobs accepted but not yet started.
    pub pending: u64,
    /// Jobs currently executing.
    pub active: u64,
}

/// A queue backend: accepts jobs and schedules calls to the shared
/// execute path. Backends differ only in how they schedule execution,
/// never in what they execute.
///
/// Two implementations exist, selected once at startup from the
/// capability descriptor: the durable Redis-backed backend and the
/// in-process fallback backend.
#[async_trait]
pub trait JobBackend: Send + Sync + std::fmt::Debug + 'static {
    /// Backend name for logs and statistics.
    fn name(&self) -> &'static str;

    /// Accept a queued record for eventual execution. Must not block on
    /// job execution; returns as soon as the job is admitted or rejected.
    async fn enqueue(&self, record: JobRecord) -> AppResult<()>;

    /// Best-effort removal of a not-yet-started job. Returns `true` if
    /// the job was removed from the pending structure.
    async fn cancel_pending(&self, kind: JobKind, id: &str) -> AppResult<bool>;

    /// Current backend statistics.
    async fn stats(&self) -> AppResult<BackendStats>;
}
