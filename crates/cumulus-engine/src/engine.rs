//! The queue facade: a uniform submit/status/cancel contract over
//! whichever backend the startup probe selected.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::traits::backend::{BackendStats, JobBackend};
use cumulus_core::traits::status_store::{JobStatusStore, StatusCounts};
use cumulus_core::types::capability::CapabilityDescriptor;
use cumulus_core::types::job::{JobKind, JobPayload, JobRecord, JobSnapshot, JobStatus};

use crate::publisher::ProgressPublisher;
use crate::rate_limit::RateLimiter;

/// A submission request. Callers supply a stable `id` to make the
/// submission idempotent; omitting it gets a fresh one.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Caller-assigned stable key, unique per kind.
    pub id: Option<String>,
    /// The category of work.
    pub kind: JobKind,
    /// Kind-specific parameters.
    pub payload: JobPayload,
}

/// Engine-wide statistics for operators.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    /// Backend queue depths; absent when submissions are being rejected
    /// because durability is mandated and the store is down.
    pub backend: Option<BackendStats>,
    /// Status-record counts.
    pub counts: StatusCounts,
}

/// The queue facade.
///
/// Admission order is fixed: payload validation, kind availability,
/// backend availability, idempotency, then rate limiting, so a
/// coalesced resubmission never consumes a rate token. A rejected
/// submission leaves no trace in the status store.
#[derive(Debug)]
pub struct QueueEngine {
    capabilities: CapabilityDescriptor,
    /// `None` when the durable store is down and policy mandates
    /// durability; every submission is then rejected.
    backend: Option<Arc<dyn JobBackend>>,
    status: Arc<dyn JobStatusStore>,
    limiter: Arc<RateLimiter>,
    publisher: Arc<ProgressPublisher>,
    /// Attempt budget stamped onto new records (backend-dependent; the
    /// fallback backend always gets 1).
    max_attempts: u32,
}

impl QueueEngine {
    /// Assemble the facade.
    pub fn new(
        capabilities: CapabilityDescriptor,
        backend: Option<Arc<dyn JobBackend>>,
        status: Arc<dyn JobStatusStore>,
        limiter: Arc<RateLimiter>,
        publisher: Arc<ProgressPublisher>,
        max_attempts: u32,
    ) -> Self {
        Self {
            capabilities,
            backend,
            status,
            limiter,
            publisher,
            max_attempts: max_attempts.max(1),
        }
    }

    /// The startup capability descriptor.
    pub fn capabilities(&self) -> &CapabilityDescriptor {
        &self.capabilities
    }

    /// Submit a job for background execution.
    ///
    /// Returns the accepted job's snapshot. Resubmitting an id that is
    /// still queued or processing coalesces onto the existing job;
    /// resubmitting a terminal id runs the job again.
    pub async fn submit(&self, request: SubmitRequest) -> AppResult<JobSnapshot> {
        request.payload.validate()?;

        if !self.capabilities.kind_enabled(request.kind) {
            return Err(AppError::capability_unavailable(format!(
                "Job kind '{}' is disabled: its external tool was not found at startup",
                request.kind
            )));
        }

        let Some(backend) = self.backend.as_ref() else {
            return Err(AppError::capability_unavailable(
                "Durable queue store is unreachable and this deployment mandates durability",
            ));
        };

        let id = match request.id {
            Some(id) if !id.trim().is_empty() => id,
            Some(_) => {
                return Err(AppError::invalid_payload("Job id must not be blank"));
            }
            None => Uuid::new_v4().to_string(),
        };

        if let Some(existing) = self.status.get(request.kind, &id).await? {
            if !existing.status.is_terminal() {
                tracing::debug!(
                    kind = %request.kind,
                    job_id = %id,
                    status = %existing.status,
                    "Submission coalesced onto live job"
                );
                return Ok(existing.snapshot());
            }
        }

        // Only submissions that create a job consume a rate token;
        // coalesced resubmissions above are free.
        self.limiter.check(request.payload.user_id, request.kind)?;

        let record = JobRecord::new(request.kind, id, request.payload, self.max_attempts);
        loop {
            if self.status.put_if_absent(&record).await? {
                break;
            }
            // Insert lost to an existing record: a terminal one from an
            // earlier run, or a racing submission of the same id.
            let Some(existing) = self.status.get(record.kind, &record.id).await? else {
                continue;
            };
            if !existing.status.is_terminal() {
                tracing::debug!(
                    kind = %record.kind,
                    job_id = %record.id,
                    status = %existing.status,
                    "Submission coalesced onto live job"
                );
                return Ok(existing.snapshot());
            }
            // Terminal records are replaced so the job runs again.
            self.status.delete(record.kind, &record.id).await?;
        }

        if let Err(e) = backend.enqueue(record.clone()).await {
            // Roll back so the rejection leaves no status entry.
            let _ = self.status.delete(record.kind, &record.id).await;
            return Err(e);
        }

        tracing::info!(
            kind = %record.kind,
            job_id = %record.id,
            backend = backend.name(),
            "Job accepted"
        );
        self.publisher.queued(&record).await;
        Ok(record.snapshot())
    }

    /// Fetch the current snapshot of a job.
    pub async fn status(&self, kind: JobKind, id: &str) -> AppResult<JobSnapshot> {
        match self.status.get(kind, id).await? {
            Some(record) => Ok(record.snapshot()),
            None => Err(AppError::not_found(format!(
                "No {kind} job with id '{id}'"
            ))),
        }
    }

    /// Cancel a job.
    ///
    /// Returns `true` if the cancellation took effect. A queued job is
    /// pulled out of its backend; a processing job is flagged so its
    /// eventual worker outcome is discarded. Terminal and unknown jobs
    /// return `false`.
    pub async fn cancel(&self, kind: JobKind, id: &str) -> AppResult<bool> {
        let Some(record) = self.status.get(kind, id).await? else {
            return Ok(false);
        };
        if record.status.is_terminal() {
            return Ok(false);
        }

        // Mark first: a worker racing to start observes the terminal
        // record and skips.
        let applied = self
            .status
            .mark(kind, id, JobStatus::Cancelled, None)
            .await?;
        if !applied {
            return Ok(false);
        }

        if record.status == JobStatus::Queued {
            if let Some(backend) = self.backend.as_ref() {
                if let Err(e) = backend.cancel_pending(kind, id).await {
                    tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to remove pending job from backend");
                }
            }
        }

        tracing::info!(kind = %kind, job_id = %id, was = %record.status, "Job cancelled");
        self.publisher.cancelled(kind, id).await;
        Ok(true)
    }

    /// Engine-wide statistics.
    pub async fn stats(&self) -> AppResult<EngineStats> {
        let backend = match self.backend.as_ref() {
            Some(backend) => Some(backend.stats().await?),
            None => None,
        };
        Ok(EngineStats {
            backend,
            counts: self.status.counts().await?,
        })
    }
}
