//! Job status store trait for pluggable persistence backends.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;
use crate::types::job::{JobKind, JobRecord, JobStatus};

/// Per-status record counts, used for operator statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    /// Jobs accepted but not yet started.
    pub queued: u64,
    /// Jobs currently executing.
    pub processing: u64,
    /// Successfully finished jobs still within retention.
    pub completed: u64,
    /// Failed jobs still within retention.
    pub failed: u64,
    /// Cancelled jobs still within retention.
    pub cancelled: u64,
}

/// Persistence for job lifecycle records, independent of the executing
/// backend so status queries behave identically in both deployment modes.
///
/// Implementations enforce the state machine: transitions that
/// [`JobStatus::can_transition_to`] forbids are ignored (not errors), so a
/// worker finishing a job that was cancelled in flight cannot resurrect it.
#[async_trait]
pub trait JobStatusStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace a record.
    async fn put(&self, record: &JobRecord) -> AppResult<()>;

    /// Insert a record only if none exists for its `(kind, id)`.
    ///
    /// Returns `true` when the record was inserted. This is the
    /// admission primitive: racing submissions of the same id resolve
    /// here, and only the winner may enqueue.
    async fn put_if_absent(&self, record: &JobRecord) -> AppResult<bool>;

    /// Fetch a record by `(kind, id)`.
    async fn get(&self, kind: JobKind, id: &str) -> AppResult<Option<JobRecord>>;

    /// Transition a record's status, setting `error` when provided.
    ///
    /// Returns `true` if the transition was applied, `false` if the record
    /// is missing or the state machine forbids it. Marking `Completed`
    /// also sets progress to 100.
    async fn mark(
        &self,
        kind: JobKind,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> AppResult<bool>;

    /// Record the attempt counter for a job.
    async fn set_attempts(&self, kind: JobKind, id: &str, attempts: u32) -> AppResult<()>;

    /// Update the progress percentage. Applied only while the record is
    /// `Processing`.
    async fn set_progress(&self, kind: JobKind, id: &str, percent: u8) -> AppResult<()>;

    /// Delete a record. Returns `true` if it existed.
    async fn delete(&self, kind: JobKind, id: &str) -> AppResult<bool>;

    /// Delete terminal records last updated before `cutoff`. Returns the
    /// number of records removed.
    async fn sweep_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64>;

    /// Count records by status.
    async fn counts(&self) -> AppResult<StatusCounts>;
}
