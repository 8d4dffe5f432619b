//! Cumulus Media Engine — background media-processing daemon
//!
//! Entry point: loads configuration, starts the engine, and waits for a
//! shutdown signal.

use std::sync::Arc;

use tracing_subscriber::{fmt, EnvFilter};

use cumulus_core::config::EngineConfig;
use cumulus_core::error::AppError;
use cumulus_core::traits::sink::LogSink;
use cumulus_engine::MediaEngine;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Engine error: {e}");
        std::process::exit(1);
    }
}

/// Load configuration from file and environment
fn load_configuration() -> Result<EngineConfig, AppError> {
    let env = std::env::var("CUMULUS_ENV").unwrap_or_else(|_| "development".to_string());
    EngineConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &EngineConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Start the engine and block until shutdown
async fn run(config: EngineConfig) -> Result<(), AppError> {
    tracing::info!("Starting Cumulus media engine v{}", env!("CARGO_PKG_VERSION"));

    let engine = MediaEngine::start(config, Arc::new(LogSink)).await?;

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    engine.shutdown().await;
    tracing::info!("Cumulus media engine shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
