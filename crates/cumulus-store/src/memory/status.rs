//! In-memory job status store.
//!
//! Backs the engine when the durable store is unreachable. Nothing here
//! survives a restart; that is the accepted trade-off of the fallback
//! deployment shape.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use cumulus_core::result::AppResult;
use cumulus_core::traits::status_store::{JobStatusStore, StatusCounts};
use cumulus_core::types::job::{JobKind, JobRecord, JobStatus};

/// DashMap-backed status store keyed by `kind:id`.
#[derive(Debug, Default)]
pub struct MemoryStatusStore {
    /// All records, keyed by the composite job key.
    records: DashMap<String, JobRecord>,
}

impl MemoryStatusStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(kind: JobKind, id: &str) -> String {
        format!("{kind}:{id}")
    }
}

#[async_trait]
impl JobStatusStore for MemoryStatusStore {
    async fn put(&self, record: &JobRecord) -> AppResult<()> {
        self.records
            .insert(Self::key(record.kind, &record.id), record.clone());
        Ok(())
    }

    async fn put_if_absent(&self, record: &JobRecord) -> AppResult<bool> {
        match self.records.entry(Self::key(record.kind, &record.id)) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(true)
            }
        }
    }

    async fn get(&self, kind: JobKind, id: &str) -> AppResult<Option<JobRecord>> {
        Ok(self.records.get(&Self::key(kind, id)).map(|r| r.clone()))
    }

    async fn mark(
        &self,
        kind: JobKind,
        id: &str,
        status: JobStatus,
        error: Option<String>,
    ) -> AppResult<bool> {
        let Some(mut entry) = self.records.get_mut(&Self::key(kind, id)) else {
            return Ok(false);
        };
        if !entry.status.can_transition_to(status) {
            tracing::debug!(
                kind = %kind,
                job_id = %id,
                from = %entry.status,
                to = %status,
                "Ignoring forbidden status transition"
            );
            return Ok(false);
        }
        entry.status = status;
        entry.error = error;
        entry.updated_at = Utc::now();
        if status == JobStatus::Completed {
            entry.progress = 100;
        }
        Ok(true)
    }

    async fn set_attempts(&self, kind: JobKind, id: &str, attempts: u32) -> AppResult<()> {
        if let Some(mut entry) = self.records.get_mut(&Self::key(kind, id)) {
            entry.attempts = attempts;
            entry.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_progress(&self, kind: JobKind, id: &str, percent: u8) -> AppResult<()> {
        if let Some(mut entry) = self.records.get_mut(&Self::key(kind, id)) {
            if entry.status == JobStatus::Processing {
                entry.progress = percent.min(100);
                entry.updated_at = Utc::now();
            }
        }
        Ok(())
    }

    async fn delete(&self, kind: JobKind, id: &str) -> AppResult<bool> {
        Ok(self.records.remove(&Self::key(kind, id)).is_some())
    }

    async fn sweep_terminal_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let before = self.records.len();
        self.records
            .retain(|_, record| !(record.status.is_terminal() && record.updated_at < cutoff));
        Ok((before - self.records.len()) as u64)
    }

    async fn counts(&self) -> AppResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for entry in self.records.iter() {
            match entry.status {
                JobStatus::Queued => counts.queued += 1,
                JobStatus::Processing => counts.processing += 1,
                JobStatus::Completed => counts.completed += 1,
                JobStatus::Failed => counts.failed += 1,
                JobStatus::Cancelled => counts.cancelled += 1,
            }
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use cumulus_core::types::job::{JobOptions, JobPayload};

    fn record(id: &str) -> JobRecord {
        JobRecord::new(
            JobKind::Thumbnail,
            id,
            JobPayload {
                input_path: "/in.jpg".into(),
                output_path: "/out.webp".into(),
                user_id: None,
                options: JobOptions::default(),
            },
            1,
        )
    }

    #[tokio::test]
    async fn test_mark_enforces_state_machine() {
        let store = MemoryStatusStore::new();
        store.put(&record("job-1")).await.unwrap();

        assert!(store
            .mark(JobKind::Thumbnail, "job-1", JobStatus::Processing, None)
            .await
            .unwrap());
        assert!(store
            .mark(JobKind::Thumbnail, "job-1", JobStatus::Cancelled, None)
            .await
            .unwrap());

        // A worker finishing after cancellation cannot resurrect the job.
        assert!(!store
            .mark(JobKind::Thumbnail, "job-1", JobStatus::Completed, None)
            .await
            .unwrap());
        let got = store.get(JobKind::Thumbnail, "job-1").await.unwrap().unwrap();
        assert_eq!(got.status, JobStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_put_if_absent_inserts_only_once() {
        let store = MemoryStatusStore::new();

        assert!(store.put_if_absent(&record("job-1")).await.unwrap());
        assert!(!store.put_if_absent(&record("job-1")).await.unwrap());

        // Freed after deletion.
        store.delete(JobKind::Thumbnail, "job-1").await.unwrap();
        assert!(store.put_if_absent(&record("job-1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_completed_sets_progress_100() {
        let store = MemoryStatusStore::new();
        store.put(&record("job-2")).await.unwrap();
        store
            .mark(JobKind::Thumbnail, "job-2", JobStatus::Processing, None)
            .await
            .unwrap();
        store
            .mark(JobKind::Thumbnail, "job-2", JobStatus::Completed, None)
            .await
            .unwrap();
        let got = store.get(JobKind::Thumbnail, "job-2").await.unwrap().unwrap();
        assert_eq!(got.progress, 100);
    }

    #[tokio::test]
    async fn test_progress_ignored_outside_processing() {
        let store = MemoryStatusStore::new();
        store.put(&record("job-3")).await.unwrap();

        store
            .set_progress(JobKind::Thumbnail, "job-3", 40)
            .await
            .unwrap();
        let got = store.get(JobKind::Thumbnail, "job-3").await.unwrap().unwrap();
        assert_eq!(got.progress, 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_old_terminal_records() {
        let store = MemoryStatusStore::new();

        let mut old_done = record("old-done");
        old_done.status = JobStatus::Completed;
        old_done.updated_at = Utc::now() - Duration::hours(100);
        store.put(&old_done).await.unwrap();

        let mut fresh_done = record("fresh-done");
        fresh_done.status = JobStatus::Completed;
        store.put(&fresh_done).await.unwrap();

        let mut old_queued = record("old-queued");
        old_queued.updated_at = Utc::now() - Duration::hours(100);
        store.put(&old_queued).await.unwrap();

        let swept = store
            .sweep_terminal_before(Utc::now() - Duration::hours(72))
            .await
            .unwrap();
        assert_eq!(swept, 1);
        assert!(store.get(JobKind::Thumbnail, "old-done").await.unwrap().is_none());
        assert!(store.get(JobKind::Thumbnail, "fresh-done").await.unwrap().is_some());
        assert!(store.get(JobKind::Thumbnail, "old-queued").await.unwrap().is_some());
    }
}
