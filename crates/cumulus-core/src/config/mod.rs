//! Engine configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod durable;
pub mod fallback;
pub mod logging;
pub mod rate_limit;
pub mod retention;
pub mod tools;

use serde::{Deserialize, Serialize};

use self::durable::DurableConfig;
use self::fallback::FallbackConfig;
use self::logging::LoggingConfig;
use self::rate_limit::RateLimitConfig;
use self::retention::RetentionConfig;
use self::tools::ToolsConfig;

use crate::error::AppError;

/// Root engine configuration.
///
/// Top-level deserialization target for the merged TOML configuration
/// files (default.toml + environment overlay + `CUMULUS__` env vars).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Durable (Redis-backed) queue settings.
    #[serde(default)]
    pub durable: DurableConfig,
    /// In-process fallback queue settings.
    #[serde(default)]
    pub fallback: FallbackConfig,
    /// Per-user submission rate limiting.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// External tool commands per job kind.
    #[serde(default)]
    pub tools: ToolsConfig,
    /// Terminal-record retention and sweep scheduling.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            durable: DurableConfig::default(),
            fallback: FallbackConfig::default(),
            rate_limit: RateLimitConfig::default(),
            tools: ToolsConfig::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific
    /// overlay and environment variables prefixed with `CUMULUS`.
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CUMULUS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))
    }
}
