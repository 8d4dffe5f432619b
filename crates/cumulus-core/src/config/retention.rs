//! Terminal-record retention configuration.

use serde::{Deserialize, Serialize};

/// Retention and periodic sweep settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Hours a terminal (completed/failed/cancelled) record is kept
    /// before the sweep deletes it.
    #[serde(default = "default_max_age")]
    pub max_age_hours: u64,
    /// Cron schedule for the retention sweep.
    #[serde(default = "default_sweep_schedule")]
    pub sweep_schedule: String,
    /// Cron schedule for evicting expired rate-limit counters.
    #[serde(default = "default_limiter_schedule")]
    pub limiter_sweep_schedule: String,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_age_hours: default_max_age(),
            sweep_schedule: default_sweep_schedule(),
            limiter_sweep_schedule: default_limiter_schedule(),
        }
    }
}

fn default_max_age() -> u64 {
    72
}

fn default_sweep_schedule() -> String {
    "0 */15 * * * *".to_string()
}

fn default_limiter_schedule() -> String {
    "0 */5 * * * *".to_string()
}
