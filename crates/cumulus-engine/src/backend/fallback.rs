//! In-process fallback queue backend.
//!
//! Used when the durable store is unreachable and durability is not
//! mandated. Scheduling is a per-kind semaphore over spawned tasks; there
//! is no persistence, so pending work is lost on restart. Single attempt
//! per job: without a durable claim there is nothing to recover a retry
//! from.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Semaphore;

use cumulus_core::config::fallback::FallbackConfig;
use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::traits::backend::{BackendStats, JobBackend};
use cumulus_core::types::job::{JobKind, JobRecord};

use crate::runner::JobRunner;

/// Per-kind scheduling state.
#[derive(Debug)]
struct KindSlots {
    /// Execution slots; tasks queue on the semaphore.
    slots: Arc<Semaphore>,
    /// Configured slot count.
    limit: usize,
    /// Admitted-but-unfinished jobs, for the pending cap.
    in_flight: Arc<Mutex<usize>>,
}

/// Bounded in-process backend executing jobs on the local runtime.
#[derive(Debug)]
pub struct FallbackBackend {
    runner: Arc<JobRunner>,
    kinds: HashMap<JobKind, KindSlots>,
    pending_cap: usize,
}

impl FallbackBackend {
    /// Create a fallback backend with per-kind slots from configuration.
    pub fn new(config: &FallbackConfig, runner: Arc<JobRunner>) -> Self {
        let kinds = JobKind::ALL
            .into_iter()
            .map(|kind| {
                let limit = config.concurrency_for(kind);
                (
                    kind,
                    KindSlots {
                        slots: Arc::new(Semaphore::new(limit)),
                        limit,
                        in_flight: Arc::new(Mutex::new(0)),
                    },
                )
            })
            .collect();
        Self {
            runner,
            kinds,
            pending_cap: config.pending_cap,
        }
    }

    fn slots(&self, kind: JobKind) -> AppResult<&KindSlots> {
        self.kinds
            .get(&kind)
            .ok_or_else(|| AppError::internal(format!("No fallback slots for kind '{kind}'")))
    }
}

#[async_trait]
impl JobBackend for FallbackBackend {
    fn name(&self) -> &'static str {
        "fallback"
    }

    async fn enqueue(&self, record: JobRecord) -> AppResult<()> {
        let slots = self.slots(record.kind)?;

        {
            let mut in_flight = slots
                .in_flight
                .lock()
                .map_err(|_| AppError::internal("Fallback admission lock poisoned"))?;
            if *in_flight >= self.pending_cap {
                return Err(AppError::queue_full(format!(
                    "Fallback queue for '{}' is at its cap of {} jobs",
                    record.kind, self.pending_cap
                )));
            }
            *in_flight += 1;
        }

        let runner = Arc::clone(&self.runner);
        let semaphore = Arc::clone(&slots.slots);
        let in_flight = Arc::clone(&slots.in_flight);
        tokio::spawn(async move {
            let kind = record.kind;
            let id = record.id.clone();

            // Closed only at process teardown; pending work is lost then
            // anyway, which is this backend's documented contract.
            if let Ok(_permit) = semaphore.acquire_owned().await {
                // A cancellation between admission and slot acquisition
                // lands here: the terminal record makes this a no-op.
                if runner.publisher().begin_attempt(kind, &id, 1).await {
                    match runner.execute(&record).await {
                        Ok(()) => runner.publisher().completed(kind, &id).await,
                        Err(e) => {
                            tracing::error!(kind = %kind, job_id = %id, error = %e, "Job failed");
                            runner.publisher().failed(kind, &id, &e).await;
                        }
                    }
                } else {
                    tracing::debug!(kind = %kind, job_id = %id, "Skipping cancelled job");
                }
            }

            if let Ok(mut guard) = in_flight.lock() {
                *guard = guard.saturating_sub(1);
            }
        });

        Ok(())
    }

    /// Pending jobs here are tasks parked on the semaphore; there is no
    /// structure to pull them out of. The caller's terminal status mark
    /// makes the parked task skip at slot acquisition.
    async fn cancel_pending(&self, _kind: JobKind, _id: &str) -> AppResult<bool> {
        Ok(true)
    }

    async fn stats(&self) -> AppResult<BackendStats> {
        let mut pending = 0u64;
        let mut active = 0u64;
        for slots in self.kinds.values() {
            let in_flight = slots
                .in_flight
                .lock()
                .map(|guard| *guard)
                .unwrap_or_default();
            let running = slots.limit.saturating_sub(slots.slots.available_permits());
            active += running as u64;
            pending += in_flight.saturating_sub(running) as u64;
        }
        Ok(BackendStats {
            backend: self.name(),
            pending,
            active,
        })
    }
}
