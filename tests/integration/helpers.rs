//! Shared test harness: an engine on the fallback backend with `sh`
//! scripts standing in for the external media tools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cumulus_core::config::fallback::FallbackConfig;
use cumulus_core::config::rate_limit::RateLimitConfig;
use cumulus_core::config::tools::{ProgressStyle, ToolConfig, ToolsConfig};
use cumulus_core::events::job::JobEvent;
use cumulus_core::traits::backend::JobBackend;
use cumulus_core::traits::sink::ProgressSink;
use cumulus_core::traits::status_store::JobStatusStore;
use cumulus_core::types::capability::CapabilityDescriptor;
use cumulus_core::types::job::{JobKind, JobOptions, JobPayload, JobRecord};
use cumulus_engine::backend::FallbackBackend;
use cumulus_engine::engine::SubmitRequest;
use cumulus_engine::process::ProcessExecutor;
use cumulus_engine::publisher::ProgressPublisher;
use cumulus_engine::rate_limit::RateLimiter;
use cumulus_engine::runner::JobRunner;
use cumulus_engine::tools::ToolCatalog;
use cumulus_engine::QueueEngine;
use cumulus_store::memory::status::MemoryStatusStore;

/// Sink pushing every event onto an unbounded channel for assertions.
#[derive(Debug)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<JobEvent>,
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn publish(&self, event: JobEvent) {
        let _ = self.tx.send(event);
    }
}

/// An engine wired for tests, plus handles into its internals.
pub struct Harness {
    pub engine: QueueEngine,
    pub status: Arc<dyn JobStatusStore>,
    pub events: mpsc::UnboundedReceiver<JobEvent>,
    pub dir: tempfile::TempDir,
}

/// Knobs for [`build_harness`].
pub struct HarnessOptions {
    /// The `sh -c` script run for every job kind.
    pub script: String,
    pub timeout_seconds: u64,
    pub fallback: FallbackConfig,
    pub rate_limit: RateLimitConfig,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            script: "printf data > {output}".to_string(),
            timeout_seconds: 5,
            fallback: FallbackConfig::default(),
            rate_limit: RateLimitConfig {
                enabled: false,
                ..Default::default()
            },
        }
    }
}

pub fn build_harness(options: HarnessOptions) -> Harness {
    let mut kinds = HashMap::new();
    for kind in JobKind::ALL {
        kinds.insert(
            kind.as_str().to_string(),
            ToolConfig {
                command: "sh".to_string(),
                args: vec!["-c".to_string(), options.script.clone()],
                timeout_seconds: options.timeout_seconds,
                progress: ProgressStyle::Percent,
            },
        );
    }

    let status: Arc<dyn JobStatusStore> = Arc::new(MemoryStatusStore::new());
    let (tx, events) = mpsc::unbounded_channel();
    let publisher = Arc::new(ProgressPublisher::new(
        Arc::clone(&status),
        Arc::new(ChannelSink { tx }),
    ));
    let runner = Arc::new(JobRunner::new(
        ToolCatalog::new(ToolsConfig { kinds }),
        ProcessExecutor::new(),
        Arc::clone(&publisher),
    ));
    let backend: Arc<dyn JobBackend> =
        Arc::new(FallbackBackend::new(&options.fallback, runner));

    let capabilities = CapabilityDescriptor {
        durable_store_available: false,
        must_use_durable: false,
        tools_available: JobKind::ALL.into_iter().map(|k| (k, true)).collect(),
    };

    let engine = QueueEngine::new(
        capabilities,
        Some(backend),
        Arc::clone(&status),
        Arc::new(RateLimiter::new(options.rate_limit)),
        publisher,
        1,
    );

    Harness {
        engine,
        status,
        events,
        dir: tempfile::tempdir().expect("tempdir"),
    }
}

impl Harness {
    /// A submission writing its artifact under the harness temp dir.
    pub fn request(&self, id: &str, kind: JobKind) -> SubmitRequest {
        SubmitRequest {
            id: Some(id.to_string()),
            kind,
            payload: JobPayload {
                input_path: "/dev/null".to_string(),
                output_path: self
                    .dir
                    .path()
                    .join(format!("{id}.out"))
                    .to_string_lossy()
                    .to_string(),
                user_id: None,
                options: JobOptions::default(),
            },
        }
    }

    /// Poll the status store until the job reaches a terminal state.
    pub async fn wait_terminal(&self, kind: JobKind, id: &str) -> JobRecord {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(10);
        loop {
            if let Some(record) = self.status.get(kind, id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            assert!(
                std::time::Instant::now() < deadline,
                "job {id} never reached a terminal state"
            );
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
    }

    /// Drain every event published so far.
    pub fn drain_events(&mut self) -> Vec<JobEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
