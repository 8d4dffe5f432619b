//! Durable queue backend over Redis.
//!
//! One worker loop per job kind claims work from the shared queue
//! structures, executes it through the shared runner, and acknowledges
//! or reschedules the claim. Claims survive a crash: on startup each
//! loop returns orphaned claims to the pending queue before polling.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::task::JoinHandle;

use cumulus_core::config::durable::DurableConfig;
use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::traits::backend::{BackendStats, JobBackend};
use cumulus_core::types::job::{JobKind, JobRecord, JobStatus};
use cumulus_store::redis::queue::DurableQueueStore;

use crate::runner::JobRunner;

/// How long shutdown waits for in-flight jobs before abandoning the
/// drain. Abandoned claims are requeued on the next startup.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Redis-backed backend with per-kind worker loops.
#[derive(Debug)]
pub struct DurableBackend {
    store: Arc<DurableQueueStore>,
    runner: Arc<JobRunner>,
    config: DurableConfig,
    /// Per-kind execution slots, shared with the worker loops.
    slots: HashMap<JobKind, Arc<Semaphore>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl DurableBackend {
    /// Create a durable backend. Workers start separately via
    /// [`DurableBackend::start`].
    pub fn new(store: DurableQueueStore, runner: Arc<JobRunner>, config: DurableConfig) -> Self {
        let slots = JobKind::ALL
            .into_iter()
            .map(|kind| {
                (
                    kind,
                    Arc::new(Semaphore::new(config.concurrency_for(kind))),
                )
            })
            .collect();
        Self {
            store: Arc::new(store),
            runner,
            config,
            slots,
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Requeue orphaned claims and start one worker loop per kind.
    pub async fn start(&self, shutdown: watch::Receiver<bool>) -> AppResult<()> {
        let mut workers = self.workers.lock().await;
        for kind in JobKind::ALL {
            let requeued = self.store.requeue_orphans(kind).await?;
            tracing::info!(
                kind = %kind,
                concurrency = self.config.concurrency_for(kind),
                requeued_orphans = requeued,
                "Starting durable queue worker"
            );

            let worker = WorkerLoop {
                store: Arc::clone(&self.store),
                runner: Arc::clone(&self.runner),
                config: self.config.clone(),
                kind,
                slots: Arc::clone(&self.slots[&kind]),
            };
            let shutdown = shutdown.clone();
            workers.push(tokio::spawn(async move { worker.run(shutdown).await }));
        }
        Ok(())
    }

    /// Wait for the worker loops to finish their drain after the
    /// shutdown signal has been sent.
    pub async fn join(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().await;
            workers.drain(..).collect()
        };
        futures::future::join_all(handles).await;
    }
}

#[async_trait]
impl JobBackend for DurableBackend {
    fn name(&self) -> &'static str {
        "durable"
    }

    async fn enqueue(&self, record: JobRecord) -> AppResult<()> {
        let inserted = self.store.enqueue(&record).await?;
        if !inserted {
            // Same (kind, id) already queued; coalesce.
            tracing::debug!(kind = %record.kind, job_id = %record.id, "Duplicate enqueue coalesced");
        }
        Ok(())
    }

    async fn cancel_pending(&self, kind: JobKind, id: &str) -> AppResult<bool> {
        self.store.cancel_pending(kind, id).await
    }

    async fn stats(&self) -> AppResult<BackendStats> {
        let mut pending = 0u64;
        let mut active = 0u64;
        for kind in JobKind::ALL {
            pending += self.store.pending_count(kind).await?;
            active += self.store.claimed_count(kind).await?;
        }
        Ok(BackendStats {
            backend: self.name(),
            pending,
            active,
        })
    }
}

/// One kind's claim-and-execute loop.
struct WorkerLoop {
    store: Arc<DurableQueueStore>,
    runner: Arc<JobRunner>,
    config: DurableConfig,
    kind: JobKind,
    slots: Arc<Semaphore>,
}

impl WorkerLoop {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let poll_interval = Duration::from_secs(self.config.poll_interval_seconds.max(1));

        loop {
            if *shutdown.borrow() {
                break;
            }

            if let Err(e) = self.store.promote_due(self.kind, Utc::now()).await {
                tracing::warn!(kind = %self.kind, error = %e, "Failed to promote delayed jobs");
            }

            self.fill_slots().await;

            tokio::select! {
                _ = shutdown.changed() => {}
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }

        self.drain().await;
    }

    /// Claim jobs while both a slot and pending work are available.
    async fn fill_slots(&self) {
        loop {
            let Ok(permit) = Arc::clone(&self.slots).try_acquire_owned() else {
                return;
            };
            match self.store.claim(self.kind).await {
                Ok(Some(record)) => {
                    let execution = Execution {
                        store: Arc::clone(&self.store),
                        runner: Arc::clone(&self.runner),
                        backoff_base_ms: self.config.backoff_base_ms,
                    };
                    tokio::spawn(async move {
                        execution.run(record).await;
                        drop(permit);
                    });
                }
                Ok(None) => return,
                Err(e) => {
                    tracing::warn!(kind = %self.kind, error = %e, "Failed to claim job");
                    return;
                }
            }
        }
    }

    /// Wait for in-flight executions, bounded by the drain timeout.
    async fn drain(&self) {
        let total = self.config.concurrency_for(self.kind) as u32;
        match tokio::time::timeout(DRAIN_TIMEOUT, self.slots.acquire_many(total)).await {
            Ok(_) => tracing::info!(kind = %self.kind, "Durable worker drained"),
            Err(_) => tracing::warn!(
                kind = %self.kind,
                "Drain timed out; claims will be requeued on next startup"
            ),
        }
    }
}

/// One claimed execution attempt, with retry scheduling.
struct Execution {
    store: Arc<DurableQueueStore>,
    runner: Arc<JobRunner>,
    backoff_base_ms: u64,
}

impl Execution {
    async fn run(&self, mut record: JobRecord) {
        let kind = record.kind;
        let id = record.id.clone();

        record.attempts += 1;
        record.updated_at = Utc::now();
        if let Err(e) = self.store.store_envelope(&record).await {
            tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to persist attempt counter");
        }

        if !self
            .runner
            .publisher()
            .begin_attempt(kind, &id, record.attempts)
            .await
        {
            // Cancelled between claim and start; release the claim.
            record.status = JobStatus::Cancelled;
            if let Err(e) = self.store.acknowledge(&record).await {
                tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to acknowledge cancelled job");
            }
            return;
        }

        match self.runner.execute(&record).await {
            Ok(()) => {
                record.status = JobStatus::Completed;
                record.progress = 100;
                record.updated_at = Utc::now();
                if let Err(e) = self.store.acknowledge(&record).await {
                    tracing::warn!(kind = %kind, job_id = %id, error = %e, "Failed to acknowledge completed job");
                }
                self.runner.publisher().completed(kind, &id).await;
            }
            Err(e) => match retry_decision(
                &e,
                record.attempts,
                record.max_attempts,
                self.backoff_base_ms,
            ) {
                RetryDecision::Retry { delay_ms } => {
                    let ready_at = Utc::now() + chrono::Duration::milliseconds(delay_ms as i64);
                    tracing::warn!(
                        kind = %kind,
                        job_id = %id,
                        attempt = record.attempts,
                        max_attempts = record.max_attempts,
                        retry_in_ms = delay_ms,
                        error = %e,
                        "Job attempt failed; scheduling retry"
                    );
                    if let Err(e) = self.store.delay_retry(&record, ready_at).await {
                        tracing::error!(kind = %kind, job_id = %id, error = %e, "Failed to schedule retry");
                        self.runner.publisher().failed(kind, &id, &e).await;
                    }
                }
                RetryDecision::Fail => {
                    tracing::error!(
                        kind = %kind,
                        job_id = %id,
                        attempt = record.attempts,
                        error = %e,
                        "Job failed terminally"
                    );
                    record.status = JobStatus::Failed;
                    record.error = Some(e.to_string());
                    record.updated_at = Utc::now();
                    if let Err(ack) = self.store.acknowledge(&record).await {
                        tracing::warn!(kind = %kind, job_id = %id, error = %ack, "Failed to acknowledge failed job");
                    }
                    self.runner.publisher().failed(kind, &id, &e).await;
                }
            },
        }
    }
}

/// What to do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryDecision {
    /// Schedule another attempt after the delay.
    Retry { delay_ms: u64 },
    /// Attempts exhausted or the error is not worth retrying.
    Fail,
}

/// Retry policy: only retryable error kinds within the attempt budget
/// get another run, delayed by `base * 2^attempt`.
fn retry_decision(
    error: &AppError,
    attempts: u32,
    max_attempts: u32,
    backoff_base_ms: u64,
) -> RetryDecision {
    if !error.kind.is_retryable() || attempts >= max_attempts {
        return RetryDecision::Fail;
    }
    RetryDecision::Retry {
        delay_ms: backoff_base_ms.saturating_mul(1u64 << attempts.min(16)),
    }
}
