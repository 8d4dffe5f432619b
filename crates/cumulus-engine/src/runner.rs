//! Shared execute path. Both backends run jobs through here; they
//! differ only in scheduling.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc;

use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::types::job::JobRecord;

use crate::process::ProcessExecutor;
use crate::publisher::ProgressPublisher;
use crate::tools::ToolCatalog;

/// Buffer for the per-job progress channel. Overflow applies
/// backpressure to the reader tasks, never drops the job.
const PROGRESS_CHANNEL_CAP: usize = 32;

/// Runs one job attempt: resolves the tool invocation, executes it with
/// progress streaming, and verifies the output artifact.
#[derive(Debug, Clone)]
pub struct JobRunner {
    catalog: ToolCatalog,
    executor: ProcessExecutor,
    publisher: Arc<ProgressPublisher>,
}

impl JobRunner {
    /// Create a runner.
    pub fn new(
        catalog: ToolCatalog,
        executor: ProcessExecutor,
        publisher: Arc<ProgressPublisher>,
    ) -> Self {
        Self {
            catalog,
            executor,
            publisher,
        }
    }

    /// The lifecycle publisher, shared with the scheduling backends.
    pub fn publisher(&self) -> &Arc<ProgressPublisher> {
        &self.publisher
    }

    /// Execute one attempt of a job to completion.
    ///
    /// An `Ok` return means the tool exited successfully AND the output
    /// artifact exists; a zero exit with no artifact is still a failure.
    pub async fn execute(&self, record: &JobRecord) -> AppResult<()> {
        let spec = self.catalog.invocation_for(record)?;

        if let Some(parent) = Path::new(&record.payload.output_path).parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AppError::with_source(
                    cumulus_core::error::ErrorKind::ProcessFailure,
                    format!("Failed to create output directory '{}': {e}", parent.display()),
                    e,
                )
            })?;
        }

        let (tx, rx) = mpsc::channel(PROGRESS_CHANNEL_CAP);
        let pump = {
            let publisher = Arc::clone(&self.publisher);
            let kind = record.kind;
            let id = record.id.clone();
            tokio::spawn(async move { publisher.pump(kind, id, rx).await })
        };

        let outcome = self.executor.run(&spec, tx).await;
        // The executor dropped its sender clones; the pump drains what
        // remains and exits.
        let _ = pump.await;
        outcome?;

        verify_artifact(&record.payload.output_path).await
    }
}

/// Confirm the tool actually produced the promised artifact.
async fn verify_artifact(output_path: &str) -> AppResult<()> {
    match tokio::fs::metadata(output_path).await {
        Ok(meta) if meta.len() > 0 => Ok(()),
        Ok(_) => Err(AppError::process_failure(format!(
            "Tool produced an empty output file at '{output_path}'"
        ))),
        Err(_) => Err(AppError::process_failure(format!(
            "Tool exited successfully but produced no output at '{output_path}'"
        ))),
    }
}
