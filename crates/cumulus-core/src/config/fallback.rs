//! Fallback queue backend configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::job::JobKind;

/// In-process fallback queue configuration.
///
/// Used only when the durable store is unreachable and durability is not
/// mandated. No persistence; pending work is lost on restart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    /// Concurrent executions per job kind unless overridden.
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    /// Per-kind concurrency overrides, keyed by kind string.
    #[serde(default)]
    pub concurrency: HashMap<String, usize>,
    /// Hard cap on admitted-but-unfinished jobs per kind; submissions
    /// beyond the cap are rejected with `QueueFull`.
    #[serde(default = "default_pending_cap")]
    pub pending_cap: usize,
}

impl FallbackConfig {
    /// Execution concurrency for a job kind.
    pub fn concurrency_for(&self, kind: JobKind) -> usize {
        self.concurrency
            .get(kind.as_str())
            .copied()
            .unwrap_or(self.default_concurrency)
            .max(1)
    }
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            default_concurrency: default_concurrency(),
            concurrency: HashMap::new(),
            pending_cap: default_pending_cap(),
        }
    }
}

fn default_concurrency() -> usize {
    2
}

fn default_pending_cap() -> usize {
    100
}
