//! Redis-backed job status store.
//!
//! Records are JSON strings under `status:{kind}:{id}`. Terminal records
//! are indexed in a sorted set scored by last-update time so the
//! retention sweep can find them without scanning, and per-status counts
//! are maintained in a hash for cheap statistics.

use ::redis::AsyncCommands;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use cumulus_core::error::{AppError, ErrorKind};
use cumulus_core::result::AppResult;
use cumulus_core::traits::status_store::{JobStatusStore, StatusCounts};
use cumulus_core::types::job::{JobKind, JobRecord, JobStatus};

use crate::redis::client::RedisClient;

/// Job status persistence on Redis.
#[derive(Debug, Clone)]
pub struct RedisStatusStore {
    /// Shared Redis connection.
    client: RedisClient,
}

impl RedisStatusStore {
    /// Create a new Redis status store.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    fn record_key(&self, kind: JobKind, id: &str) -> String {
        self.client.prefixed_key(&format!("status:{kind}:{id}"))
    }

    fn terminal_index_key(&self) -> String {
        self.client.prefixed_key("status:terminal")
    }

    fn counts_key(&self) -> String {
        self.client.prefixed_key("status:counts")
    }

    async fn load(&self, kind: JobKind, id: &str) -> AppResult<Option<JobRecord>> {
        let mut conn = self.client.conn();
        let json: Option<String> = conn
            .get(self.record_key(kind, id))
            .await
            .map_err(|e| store_err("Failed to read job record", e))?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, record: &JobRecord) -> AppResult<()> {
        let mut conn = self.client.conn();
        let json = serde_json::to_string(record)?;
        let _: () = conn
            .set(self.record_key(record.kind, &record.id), json)
            .await
            .map_err(|e| store_err("Failed to write job record", e))?;

        let member = record.key();
        if record.status.is_terminal() {
            let _: i64 = conn
                .zadd(
                    self.terminal_index_key(),
                    &member,
                    record.updated_at.timestamp_millis(),
                )
                .await
                .map_err(|e| store_err("Failed to index terminal record", e))?;
        } else {
            let _: i64 = conn
                .zrem(self.terminal_index_key(), &member)
                .await
                .map_err(|e| store_err("Failed to unindex record", e))?;
        }
        Ok(())
    }

    async fn shift_counts(&self, from: Option<JobStatus>, to: Option<JobStatus>) -> AppResult<()> {
        let mut conn = self.client.conn();
        if let Some(from) = from {
            let _: i64 = conn
                .hincr(self.counts_key(), from.to_string(), -1)
                .await
                .map_err(|e| store_err("Failed to decrement status count", e))?;
        }
        if let Some(to) = to {
            let _: i64 = conn
                .hincr(self.counts_key(), to.to_string(), 1)
                .await
                .map_err(|e| store_err("Failed to increment status count", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobStatusStore for RedisStatusStore {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        let previous = self.load(record.kind, &record.id).await?;
        self.save(record).await?;
        self.shift_counts(previous.map(|p| p.status), Some(record.status))
            .await
    }

    async fn put_if_absent(&self, record: &JobRecord) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let json = serde_json::to_string(record)?;
        let inserted: bool = conn
            .set_nx(self.record_key(record.kind, &record.id), json)
            .await
            .map_err(|e| store_err("Failed to insert job record", e))?;
        if inserted {
            if record.status.is_terminal() {
                let _: i64 = conn
                    .zadd(
                        self.terminal_index_key(),
                        record.key(),
                        record.updated_at.timestamp_millis(),
                    )
                    .await
                    .map_err(|e| store_err("Failed to index terminal record", e))?;
            }
            self.shift_counts(None, Some(record.status)).await?;
        }
        Ok(inserted)
    }

    async fn get(&self, kind: JobKind, id: &str) -> AppResult<Option<JobRecord>> {
        self.load(kind, id).await
    }

    async fn mark(
        &self,
        kind: JobKind,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> AppResult<bool> {
        let Some(mut record) = self.load(kind, id).await? else {
            return Ok(false);
        };
        if !record.status.can_transition_to(status) {
            tracing::debug!(
                kind = %kind,
                job_id = %id,
                from = %record.status,
                to = %status,
                "Ignoring forbidden status transition"
            );
            return Ok(false);
        }

        let previous = record.status;
        record.status = status;
        record.error = error;
        record.updated_at = Utc::now();
        if status == JobStatus::Completed {
            record.progress = 100;
        }

        self.save(&record).await?;
        self.shift_counts(Some(previous), Some(status)).await?;
        Ok(true)
    }

    async fn set_attempts(&self, kind: JobKind, id: &str, attempts: u32) -> AppResult<()> {
        if let Some(mut record) = self.load(kind, id).await? {
            record.attempts = attempts;
            record.updated_at = Utc::now();
            self.save(&record).await?;
        }
        Ok(())
    }

    async fn set_progress(&self, kind: JobKind, id: &str, percent: u8) -> AppResult<()> {
        if let Some(mut record) = self.load(kind, id).await? {
            if record.status == JobStatus::Processing {
                record.progress = percent.min(100);
                record.updated_at = Utc::now();
                self.save(&record).await?;
            }
        }
        Ok(())
    }

    async fn delete(&self, kind: JobKind, id: &str) -> AppResult<bool> {
        let Some(record) = self.load(kind, id).await? else {
            return Ok(false);
        };

        let mut conn = self.client.conn();
        let _: i64 = conn
            .del(self.record_key(kind, id))
            .await
            .map_err(|e| store_err("Failed to delete job record", e))?;
        let _: i64 = conn
            .zrem(self.terminal_index_key(), record.key())
            .await
            .map_err(|e| store_err("Failed to unindex deleted record", e))?;

        self.shift_counts(Some(record.status), None).await?;
        Ok(true)
    }

    async fn sweep_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut swept = 0u64;
        loop {
            let mut conn = self.client.conn();
            let batch: Vec<String> = conn
                .zrangebyscore_limit(
                    self.terminal_index_key(),
                    0,
                    cutoff.timestamp_millis(),
                    0,
                    500,
                )
                .await
                .map_err(|e| store_err("Failed to scan terminal records", e))?;

            if batch.is_empty() {
                break;
            }

            for member in batch {
                let Some((kind_str, id)) = member.split_once(':') else {
                    let _: i64 = conn
                        .zrem(self.terminal_index_key(), &member)
                        .await
                        .map_err(|e| store_err("Failed to drop malformed index entry", e))?;
                    continue;
                };
                let kind: JobKind = match kind_str.parse() {
                    Ok(kind) => kind,
                    Err(_) => {
                        let _: i64 = conn
                            .zrem(self.terminal_index_key(), &member)
                            .await
                            .map_err(|e| store_err("Failed to drop malformed index entry", e))?;
                        continue;
                    }
                };
                if self.delete(kind, id).await? {
                    swept += 1;
                } else {
                    // Index entry without a record; drop it so the scan
                    // cannot loop on it.
                    let _: i64 = conn
                        .zrem(self.terminal_index_key(), &member)
                        .await
                        .map_err(|e| store_err("Failed to drop stale index entry", e))?;
                }
            }
        }
        Ok(swept)
    }

    async fn counts(&self) -> AppResult<StatusCounts> {
        let mut conn = self.client.conn();
        let raw: std::collections::HashMap<String, i64> = conn
            .hgetall(self.counts_key())
            .await
            .map_err(|e| store_err("Failed to read status counts", e))?;

        let count = |status: JobStatus| raw.get(&status.to_string()).copied().unwrap_or(0).max(0) as u64;
        Ok(StatusCounts {
            queued: count(JobStatus::Queued),
            processing: count(JobStatus::Processing),
            completed: count(JobStatus::Completed),
            failed: count(JobStatus::Failed),
            cancelled: count(JobStatus::Cancelled),
        })
    }
}

fn store_err(message: &str, err: ::redis::RedisError) -> AppError {
    AppError::with_source(ErrorKind::Persistence, message, err)
}
