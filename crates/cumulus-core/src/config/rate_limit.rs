//! Submission rate-limit configuration.

use serde::{Deserialize, Serialize};

/// Per-user sliding-window rate limiting.
///
/// Counters are keyed by `(user, kind)` and live in process memory only;
/// the limiter is abuse mitigation, not a correctness guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Whether the limiter is active.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Rolling window length in seconds.
    #[serde(default = "default_window")]
    pub window_seconds: u64,
    /// Maximum submissions per user, per kind, within one window.
    #[serde(default = "default_max")]
    pub max_per_window: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            window_seconds: default_window(),
            max_per_window: default_max(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_window() -> u64 {
    3_600
}

fn default_max() -> u32 {
    100
}
