//! Durable queue storage on Redis.
//!
//! Layout per job kind (all keys under the configured prefix):
//!
//! - `queue:{kind}:pending` — list of job ids awaiting a worker (FIFO)
//! - `queue:{kind}:claimed` — list of job ids a worker has popped but not
//!   yet acknowledged; requeued on startup after a crash
//! - `queue:{kind}:delayed` — sorted set of job ids awaiting a retry,
//!   scored by ready-at epoch milliseconds
//! - `queue:{kind}:job:{id}` — the JSON job envelope (payload + attempts)
//! - `queue:{kind}:history` — bounded list of terminal envelopes
//!
//! Queued, delayed, and claimed entries all survive process restarts;
//! this is the crash-recovery property the fallback backend lacks.

use ::redis::{AsyncCommands, Direction};
use chrono::{DateTime, Utc};

use cumulus_core::error::{AppError, ErrorKind};
use cumulus_core::result::AppResult;
use cumulus_core::types::job::{JobKind, JobRecord};

use crate::redis::client::RedisClient;

/// Typed operations over the Redis queue structures.
#[derive(Debug, Clone)]
pub struct DurableQueueStore {
    /// Shared Redis connection.
    client: RedisClient,
    /// Bounded retained history of terminal envelopes, per kind.
    history_cap: usize,
}

impl DurableQueueStore {
    /// Create a new queue store.
    pub fn new(client: RedisClient, history_cap: usize) -> Self {
        Self {
            client,
            history_cap,
        }
    }

    fn pending_key(&self, kind: JobKind) -> String {
        self.client.prefixed_key(&format!("queue:{kind}:pending"))
    }

    fn claimed_key(&self, kind: JobKind) -> String {
        self.client.prefixed_key(&format!("queue:{kind}:claimed"))
    }

    fn delayed_key(&self, kind: JobKind) -> String {
        self.client.prefixed_key(&format!("queue:{kind}:delayed"))
    }

    fn envelope_key(&self, kind: JobKind, id: &str) -> String {
        self.client.prefixed_key(&format!("queue:{kind}:job:{id}"))
    }

    fn history_key(&self, kind: JobKind) -> String {
        self.client.prefixed_key(&format!("queue:{kind}:history"))
    }

    /// Enqueue a job. Returns `false` without enqueuing when an envelope
    /// for the same `(kind, id)` already exists (idempotent submission).
    pub async fn enqueue(&self, record: &JobRecord) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let envelope = serde_json::to_string(record)?;

        let inserted: bool = conn
            .set_nx(self.envelope_key(record.kind, &record.id), envelope)
            .await
            .map_err(|e| queue_err("Failed to store job envelope", e))?;

        if !inserted {
            return Ok(false);
        }

        let _: i64 = conn
            .rpush(self.pending_key(record.kind), &record.id)
            .await
            .map_err(|e| queue_err("Failed to push job onto pending queue", e))?;

        Ok(true)
    }

    /// Claim the next pending job of a kind. The id moves to the claimed
    /// list so a crash between claim and acknowledgement is recoverable.
    pub async fn claim(&self, kind: JobKind) -> AppResult<Option<JobRecord>> {
        let mut conn = self.client.conn();

        loop {
            let id: Option<String> = conn
                .lmove(
                    self.pending_key(kind),
                    self.claimed_key(kind),
                    Direction::Left,
                    Direction::Right,
                )
                .await
                .map_err(|e| queue_err("Failed to claim job", e))?;

            let Some(id) = id else {
                return Ok(None);
            };

            let envelope: Option<String> = conn
                .get(self.envelope_key(kind, &id))
                .await
                .map_err(|e| queue_err("Failed to load job envelope", e))?;

            match envelope {
                Some(json) => {
                    let record: JobRecord = serde_json::from_str(&json)?;
                    return Ok(Some(record));
                }
                // Envelope deleted by a cancellation; drop the stale id
                // and keep claiming.
                None => {
                    let _: i64 = conn
                        .lrem(self.claimed_key(kind), 1, &id)
                        .await
                        .map_err(|e| queue_err("Failed to drop cancelled job id", e))?;
                }
            }
        }
    }

    /// Persist an updated envelope (attempt counter bump) for a claimed job.
    pub async fn store_envelope(&self, record: &JobRecord) -> AppResult<()> {
        let mut conn = self.client.conn();
        let envelope = serde_json::to_string(record)?;
        let _: () = conn
            .set(self.envelope_key(record.kind, &record.id), envelope)
            .await
            .map_err(|e| queue_err("Failed to update job envelope", e))?;
        Ok(())
    }

    /// Acknowledge a terminal outcome: remove the claim and the envelope,
    /// and append the final envelope to the bounded history.
    pub async fn acknowledge(&self, record: &JobRecord) -> AppResult<()> {
        let mut conn = self.client.conn();

        let _: i64 = conn
            .lrem(self.claimed_key(record.kind), 1, &record.id)
            .await
            .map_err(|e| queue_err("Failed to release claim", e))?;
        let _: i64 = conn
            .del(self.envelope_key(record.kind, &record.id))
            .await
            .map_err(|e| queue_err("Failed to delete job envelope", e))?;

        let envelope = serde_json::to_string(record)?;
        let _: i64 = conn
            .lpush(self.history_key(record.kind), envelope)
            .await
            .map_err(|e| queue_err("Failed to append job history", e))?;
        let _: () = conn
            .ltrim(self.history_key(record.kind), 0, self.history_cap as isize - 1)
            .await
            .map_err(|e| queue_err("Failed to trim job history", e))?;

        Ok(())
    }

    /// Move a claimed job into the delayed set for a retry at `ready_at`.
    pub async fn delay_retry(
        &self,
        record: &JobRecord,
        ready_at: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut conn = self.client.conn();

        self.store_envelope(record).await?;

        let _: i64 = conn
            .lrem(self.claimed_key(record.kind), 1, &record.id)
            .await
            .map_err(|e| queue_err("Failed to release claim for retry", e))?;
        let _: i64 = conn
            .zadd(
                self.delayed_key(record.kind),
                &record.id,
                ready_at.timestamp_millis(),
            )
            .await
            .map_err(|e| queue_err("Failed to schedule retry", e))?;

        Ok(())
    }

    /// Move delayed jobs whose ready time has passed back onto the
    /// pending queue. Returns how many were promoted.
    pub async fn promote_due(&self, kind: JobKind, now: DateTime<Utc>) -> AppResult<u64> {
        let mut conn = self.client.conn();

        let due: Vec<String> = conn
            .zrangebyscore_limit(
                self.delayed_key(kind),
                0,
                now.timestamp_millis(),
                0,
                100,
            )
            .await
            .map_err(|e| queue_err("Failed to scan delayed jobs", e))?;

        let mut promoted = 0u64;
        for id in due {
            let removed: i64 = conn
                .zrem(self.delayed_key(kind), &id)
                .await
                .map_err(|e| queue_err("Failed to remove delayed job", e))?;
            // Another instance may have promoted it first.
            if removed > 0 {
                let _: i64 = conn
                    .rpush(self.pending_key(kind), &id)
                    .await
                    .map_err(|e| queue_err("Failed to requeue delayed job", e))?;
                promoted += 1;
            }
        }

        Ok(promoted)
    }

    /// Remove a not-yet-started job from the pending queue or the delayed
    /// set. Returns `true` if the job was removed.
    pub async fn cancel_pending(&self, kind: JobKind, id: &str) -> AppResult<bool> {
        let mut conn = self.client.conn();

        let removed: i64 = conn
            .lrem(self.pending_key(kind), 1, id)
            .await
            .map_err(|e| queue_err("Failed to remove pending job", e))?;

        let removed = if removed > 0 {
            true
        } else {
            let dropped: i64 = conn
                .zrem(self.delayed_key(kind), id)
                .await
                .map_err(|e| queue_err("Failed to remove delayed job", e))?;
            dropped > 0
        };

        if removed {
            let _: i64 = conn
                .del(self.envelope_key(kind, id))
                .await
                .map_err(|e| queue_err("Failed to delete cancelled envelope", e))?;
        }

        Ok(removed)
    }

    /// Return ids orphaned on the claimed list (crashed worker) to the
    /// pending queue. Run once at backend startup.
    pub async fn requeue_orphans(&self, kind: JobKind) -> AppResult<u64> {
        let mut conn = self.client.conn();
        let mut requeued = 0u64;

        loop {
            let id: Option<String> = conn
                .lmove(
                    self.claimed_key(kind),
                    self.pending_key(kind),
                    Direction::Left,
                    Direction::Right,
                )
                .await
                .map_err(|e| queue_err("Failed to requeue orphaned job", e))?;
            if id.is_none() {
                break;
            }
            requeued += 1;
        }

        if requeued > 0 {
            tracing::warn!(kind = %kind, count = requeued, "Requeued orphaned claimed jobs");
        }
        Ok(requeued)
    }

    /// Jobs awaiting a worker (pending + delayed).
    pub async fn pending_count(&self, kind: JobKind) -> AppResult<u64> {
        let mut conn = self.client.conn();
        let pending: u64 = conn
            .llen(self.pending_key(kind))
            .await
            .map_err(|e| queue_err("Failed to count pending jobs", e))?;
        let delayed: u64 = conn
            .zcard(self.delayed_key(kind))
            .await
            .map_err(|e| queue_err("Failed to count delayed jobs", e))?;
        Ok(pending + delayed)
    }

    /// Jobs currently claimed by workers.
    pub async fn claimed_count(&self, kind: JobKind) -> AppResult<u64> {
        let mut conn = self.client.conn();
        let claimed: u64 = conn
            .llen(self.claimed_key(kind))
            .await
            .map_err(|e| queue_err("Failed to count claimed jobs", e))?;
        Ok(claimed)
    }
}

fn queue_err(message: &str, err: ::redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Queue, message, err)
}
