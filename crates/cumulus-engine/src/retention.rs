//! Scheduled maintenance: terminal-record retention sweeps and
//! rate-limit counter eviction.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_cron_scheduler::{Job, JobScheduler};

use cumulus_core::config::retention::RetentionConfig;
use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::traits::status_store::JobStatusStore;

use crate::rate_limit::RateLimiter;

/// Owns the cron scheduler driving the periodic sweeps.
pub struct MaintenanceScheduler {
    scheduler: JobScheduler,
}

impl std::fmt::Debug for MaintenanceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaintenanceScheduler").finish_non_exhaustive()
    }
}

impl MaintenanceScheduler {
    /// Register and start the sweeps.
    pub async fn start(
        config: &RetentionConfig,
        status: Arc<dyn JobStatusStore>,
        limiter: Arc<RateLimiter>,
    ) -> AppResult<Self> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let max_age_hours = config.max_age_hours;
        let retention_job = Job::new_async(config.sweep_schedule.as_str(), move |_id, _lock| {
            let status = Arc::clone(&status);
            Box::pin(async move {
                let cutoff = Utc::now() - Duration::hours(max_age_hours as i64);
                match status.sweep_terminal_before(cutoff).await {
                    Ok(0) => {}
                    Ok(removed) => {
                        tracing::info!(removed, max_age_hours, "Swept expired terminal job records");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Retention sweep failed");
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid retention sweep schedule '{}': {e}",
                config.sweep_schedule
            ))
        })?;

        let limiter_job =
            Job::new_async(config.limiter_sweep_schedule.as_str(), move |_id, _lock| {
                let limiter = Arc::clone(&limiter);
                Box::pin(async move {
                    let evicted = limiter.sweep_expired();
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted expired rate-limit counters");
                    }
                })
            })
            .map_err(|e| {
                AppError::configuration(format!(
                    "Invalid limiter sweep schedule '{}': {e}",
                    config.limiter_sweep_schedule
                ))
            })?;

        scheduler
            .add(retention_job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to register retention sweep: {e}")))?;
        scheduler
            .add(limiter_job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to register limiter sweep: {e}")))?;

        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!(
            sweep_schedule = %config.sweep_schedule,
            limiter_sweep_schedule = %config.limiter_sweep_schedule,
            max_age_hours = config.max_age_hours,
            "Maintenance scheduler started"
        );
        Ok(Self { scheduler })
    }

    /// Stop the scheduler. Pending sweep runs are abandoned.
    pub async fn shutdown(&mut self) {
        if let Err(e) = self.scheduler.shutdown().await {
            tracing::warn!(error = %e, "Scheduler shutdown failed");
        }
    }
}
