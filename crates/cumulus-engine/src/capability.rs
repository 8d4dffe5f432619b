//! Startup capability probing.
//!
//! Runs once before the engine accepts work: checks the durable store
//! and every configured external tool, and freezes the result into a
//! [`CapabilityDescriptor`]. The environment is never re-probed; picking
//! up changes requires a restart.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use cumulus_core::config::EngineConfig;
use cumulus_core::types::capability::CapabilityDescriptor;
use cumulus_core::types::job::JobKind;
use cumulus_store::RedisClient;

/// Probes the deployment environment at startup.
#[derive(Debug)]
pub struct CapabilityProber;

impl CapabilityProber {
    /// Probe the durable store and the external tools.
    ///
    /// Never fails: an unreachable store or a missing tool degrades the
    /// descriptor instead. The connected client is returned alongside so
    /// the probe connection is reused by the durable backend.
    pub async fn probe(config: &EngineConfig) -> (CapabilityDescriptor, Option<RedisClient>) {
        let client = Self::probe_durable(config).await;

        let mut tools_available = HashMap::new();
        for kind in JobKind::ALL {
            let available = match config.tools.tool_for(kind) {
                Some(tool) => tool_on_path(&tool.command),
                None => false,
            };
            if !available {
                tracing::warn!(
                    kind = %kind,
                    command = config.tools.tool_for(kind).map(|t| t.command.as_str()).unwrap_or("<unconfigured>"),
                    "External tool not found; job kind disabled"
                );
            }
            tools_available.insert(kind, available);
        }

        let descriptor = CapabilityDescriptor {
            durable_store_available: client.is_some(),
            must_use_durable: config.durable.must_use_durable,
            tools_available,
        };
        tracing::info!(
            durable = descriptor.durable_store_available,
            must_use_durable = descriptor.must_use_durable,
            disabled_kinds = ?descriptor.disabled_kinds(),
            "Capability probe complete"
        );
        (descriptor, client)
    }

    /// Connect and ping the durable store within the configured timeout.
    async fn probe_durable(config: &EngineConfig) -> Option<RedisClient> {
        let budget = Duration::from_secs(config.durable.connect_timeout_seconds.max(1));
        let attempt = async {
            let client = RedisClient::connect(&config.durable).await?;
            client.ping().await?;
            Ok::<_, cumulus_core::error::AppError>(client)
        };
        match tokio::time::timeout(budget, attempt).await {
            Ok(Ok(client)) => Some(client),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Durable store probe failed");
                None
            }
            Err(_) => {
                tracing::warn!(
                    timeout_seconds = budget.as_secs(),
                    "Durable store probe timed out"
                );
                None
            }
        }
    }
}

/// Whether a tool command resolves to an existing file, either as a
/// given path or somewhere on `PATH`.
fn tool_on_path(command: &str) -> bool {
    let path = Path::new(command);
    if path.components().count() > 1 {
        return path.is_file();
    }
    match std::env::var_os("PATH") {
        Some(paths) => std::env::split_paths(&paths).any(|dir| dir.join(command).is_file()),
        None => false,
    }
}
