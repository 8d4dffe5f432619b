//! Durable queue backend configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::job::JobKind;

/// Durable (Redis-backed) queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableConfig {
    /// Redis connection URL.
    #[serde(default = "default_url")]
    pub url: String,
    /// Key prefix for all engine keys.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Startup probe timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Reject submissions instead of degrading to the fallback backend
    /// when the durable store is down. Intended for multi-instance
    /// production deployments where CPU-heavy jobs must never compete
    /// with request-serving resources in-process.
    #[serde(default)]
    pub must_use_durable: bool,
    /// Worker slots per job kind unless overridden. Kept small because
    /// jobs are CPU/IO heavy.
    #[serde(default = "default_concurrency")]
    pub default_concurrency: usize,
    /// Per-kind worker slot overrides, keyed by kind string.
    #[serde(default)]
    pub concurrency: HashMap<String, usize>,
    /// Maximum execution attempts per job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Retry backoff base delay in milliseconds; attempt `n` waits
    /// `base * 2^n`.
    #[serde(default = "default_backoff_base")]
    pub backoff_base_ms: u64,
    /// Seconds between queue polls when no work is available.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,
    /// Bounded retained history of terminal queue envelopes, per kind.
    #[serde(default = "default_history_cap")]
    pub history_cap: usize,
}

impl DurableConfig {
    /// Worker concurrency for a job kind.
    pub fn concurrency_for(&self, kind: JobKind) -> usize {
        self.concurrency
            .get(kind.as_str())
            .copied()
            .unwrap_or(self.default_concurrency)
            .max(1)
    }
}

impl Default for DurableConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            key_prefix: default_key_prefix(),
            connect_timeout_seconds: default_connect_timeout(),
            must_use_durable: false,
            default_concurrency: default_concurrency(),
            concurrency: HashMap::new(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base(),
            poll_interval_seconds: default_poll_interval(),
            history_cap: default_history_cap(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_key_prefix() -> String {
    "cumulus:media:".to_string()
}

fn default_connect_timeout() -> u64 {
    3
}

fn default_concurrency() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_base() -> u64 {
    2_000
}

fn default_poll_interval() -> u64 {
    2
}

fn default_history_cap() -> usize {
    200
}
