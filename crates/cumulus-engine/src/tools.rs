//! Tool catalog: resolves a job record into a concrete tool invocation.

use std::path::Path;
use std::time::Duration;

use cumulus_core::config::tools::{ToolConfig, ToolsConfig};
use cumulus_core::error::AppError;
use cumulus_core::result::AppResult;
use cumulus_core::types::job::{JobKind, JobRecord};

use crate::process::executor::ProcessSpec;
use crate::process::progress::ProgressParser;

/// Default quality when a payload does not specify one (tool-specific
/// scale; chosen for the default vp9 encode).
const DEFAULT_QUALITY: u32 = 32;

/// Maps job kinds to configured external tool contracts and builds the
/// substituted command line for a job.
///
/// Both backends execute jobs through this catalog; they differ only in
/// scheduling.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    /// Per-kind tool configuration.
    config: ToolsConfig,
}

impl ToolCatalog {
    /// Create a catalog from configuration.
    pub fn new(config: ToolsConfig) -> Self {
        Self { config }
    }

    /// The configured command for a kind, for capability probing.
    pub fn command_for(&self, kind: JobKind) -> Option<&str> {
        self.config.tool_for(kind).map(|tool| tool.command.as_str())
    }

    /// Build the fully substituted invocation for a job.
    pub fn invocation_for(&self, record: &JobRecord) -> AppResult<ProcessSpec> {
        let tool = self.config.tool_for(record.kind).ok_or_else(|| {
            AppError::capability_unavailable(format!(
                "No tool configured for job kind '{}'",
                record.kind
            ))
        })?;

        let args = substitute_args(tool, record);
        let parser = ProgressParser::from_style(tool.progress, record.payload.options.duration_seconds);

        Ok(ProcessSpec {
            command: tool.command.clone(),
            args,
            timeout: Duration::from_secs(tool.timeout_seconds),
            parser,
        })
    }
}

/// Substitute template placeholders in the tool's argument list.
fn substitute_args(tool: &ToolConfig, record: &JobRecord) -> Vec<String> {
    let payload = &record.payload;
    let output_dir = Path::new(&payload.output_path)
        .parent()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default();
    let format = payload
        .options
        .format
        .clone()
        .or_else(|| {
            Path::new(&payload.output_path)
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
        })
        .unwrap_or_default();
    let quality = payload
        .options
        .quality
        .unwrap_or(DEFAULT_QUALITY)
        .to_string();

    tool.args
        .iter()
        .map(|arg| {
            arg.replace("{input}", &payload.input_path)
                .replace("{output}", &payload.output_path)
                .replace("{output_dir}", &output_dir)
                .replace("{format}", &format)
                .replace("{quality}", &quality)
        })
        .collect()
}
