//! Engine assembly: probe, pick a backend, wire the facade, start
//! maintenance.

use std::sync::Arc;

use tokio::sync::watch;

use cumulus_core::config::EngineConfig;
use cumulus_core::result::AppResult;
use cumulus_core::traits::backend::JobBackend;
use cumulus_core::traits::sink::ProgressSink;
use cumulus_store::{build_status_store, DurableQueueStore};

use crate::backend::{DurableBackend, FallbackBackend};
use crate::capability::CapabilityProber;
use crate::engine::QueueEngine;
use crate::process::ProcessExecutor;
use crate::publisher::ProgressPublisher;
use crate::rate_limit::RateLimiter;
use crate::retention::MaintenanceScheduler;
use crate::runner::JobRunner;
use crate::tools::ToolCatalog;

/// The fully assembled engine and its background machinery.
#[derive(Debug)]
pub struct MediaEngine {
    engine: Arc<QueueEngine>,
    scheduler: MaintenanceScheduler,
    shutdown_tx: watch::Sender<bool>,
    durable: Option<Arc<DurableBackend>>,
}

impl MediaEngine {
    /// Probe the environment, select a backend, and start workers and
    /// maintenance sweeps.
    pub async fn start(config: EngineConfig, sink: Arc<dyn ProgressSink>) -> AppResult<Self> {
        let (capabilities, client) = CapabilityProber::probe(&config).await;

        let status = build_status_store(&capabilities, client.as_ref());
        let limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));
        let publisher = Arc::new(ProgressPublisher::new(Arc::clone(&status), sink));
        let runner = Arc::new(JobRunner::new(
            ToolCatalog::new(config.tools.clone()),
            ProcessExecutor::new(),
            Arc::clone(&publisher),
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut durable = None;
        let (backend, max_attempts): (Option<Arc<dyn JobBackend>>, u32) = match client {
            Some(client) => {
                let store = DurableQueueStore::new(client, config.durable.history_cap);
                let backend = Arc::new(DurableBackend::new(
                    store,
                    Arc::clone(&runner),
                    config.durable.clone(),
                ));
                backend.start(shutdown_rx).await?;
                durable = Some(Arc::clone(&backend));
                tracing::info!("Using the durable queue backend");
                (Some(backend), config.durable.max_attempts)
            }
            None if capabilities.must_use_durable => {
                tracing::error!(
                    "Durable store unreachable and durability is mandated; all submissions will be rejected"
                );
                (None, 1)
            }
            None => {
                tracing::warn!(
                    "Durable store unreachable; degrading to the in-process fallback backend (no persistence)"
                );
                let backend = Arc::new(FallbackBackend::new(&config.fallback, Arc::clone(&runner)));
                (Some(backend), 1)
            }
        };

        let scheduler = MaintenanceScheduler::start(
            &config.retention,
            Arc::clone(&status),
            Arc::clone(&limiter),
        )
        .await?;

        let engine = Arc::new(QueueEngine::new(
            capabilities,
            backend,
            status,
            limiter,
            publisher,
            max_attempts,
        ));

        Ok(Self {
            engine,
            scheduler,
            shutdown_tx,
            durable,
        })
    }

    /// The submit/status/cancel facade.
    pub fn engine(&self) -> Arc<QueueEngine> {
        Arc::clone(&self.engine)
    }

    /// Signal shutdown and wait for the workers to drain.
    pub async fn shutdown(mut self) {
        tracing::info!("Shutting down media engine");
        let _ = self.shutdown_tx.send(true);
        if let Some(durable) = self.durable.take() {
            durable.join().await;
        }
        self.scheduler.shutdown().await;
        tracing::info!("Media engine stopped");
    }
}
