//! External media tool configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::job::JobKind;

/// How a tool reports progress on its output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStyle {
    /// ffmpeg-style `time=HH:MM:SS.ff` markers, converted to a
    /// percentage against the payload's known duration.
    Ffmpeg,
    /// Plain `NN%` markers.
    Percent,
    /// No progress markers.
    #[serde(rename = "none")]
    Silent,
}

/// One external tool invocation contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    /// The executable name or absolute path.
    pub command: String,
    /// Argument template. `{input}`, `{output}`, `{output_dir}`,
    /// `{format}`, and `{quality}` are substituted per job.
    pub args: Vec<String>,
    /// Hard wall-clock timeout per invocation, in seconds. There is no
    /// "wait forever".
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
    /// Progress marker style on the tool's output streams.
    #[serde(default = "default_progress")]
    pub progress: ProgressStyle,
}

/// Tool contracts per job kind, keyed by kind string.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolsConfig {
    /// Per-kind tool definitions.
    pub kinds: HashMap<String, ToolConfig>,
}

impl ToolsConfig {
    /// The tool contract for a job kind, if configured.
    pub fn tool_for(&self, kind: JobKind) -> Option<&ToolConfig> {
        self.kinds.get(kind.as_str())
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        let mut kinds = HashMap::new();
        kinds.insert(
            JobKind::Thumbnail.as_str().to_string(),
            ToolConfig {
                command: "ffmpeg".to_string(),
                args: [
                    "-y", "-i", "{input}", "-vf", "thumbnail,scale=320:-2", "-frames:v", "1",
                    "{output}",
                ]
                .map(String::from)
                .to_vec(),
                timeout_seconds: 60,
                progress: ProgressStyle::Silent,
            },
        );
        kinds.insert(
            JobKind::VideoTranscode.as_str().to_string(),
            ToolConfig {
                command: "ffmpeg".to_string(),
                args: [
                    "-y", "-i", "{input}", "-c:v", "libvpx-vp9", "-crf", "{quality}", "-b:v",
                    "0", "-c:a", "libopus", "{output}",
                ]
                .map(String::from)
                .to_vec(),
                timeout_seconds: 1_800,
                progress: ProgressStyle::Ffmpeg,
            },
        );
        kinds.insert(
            JobKind::AudioRender.as_str().to_string(),
            ToolConfig {
                command: "ffmpeg".to_string(),
                args: ["-y", "-i", "{input}", "-c:a", "libopus", "-b:a", "96k", "{output}"]
                    .map(String::from)
                    .to_vec(),
                timeout_seconds: 600,
                progress: ProgressStyle::Ffmpeg,
            },
        );
        kinds.insert(
            JobKind::DocumentConvert.as_str().to_string(),
            ToolConfig {
                command: "soffice".to_string(),
                args: [
                    "--headless",
                    "--convert-to",
                    "pdf",
                    "--outdir",
                    "{output_dir}",
                    "{input}",
                ]
                .map(String::from)
                .to_vec(),
                timeout_seconds: 120,
                progress: ProgressStyle::Silent,
            },
        );
        Self { kinds }
    }
}

fn default_timeout() -> u64 {
    300
}

fn default_progress() -> ProgressStyle {
    ProgressStyle::Silent
}
