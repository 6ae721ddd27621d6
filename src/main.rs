//! Kindling Server — plugin bootstrap runtime
//!
//! Main entry point that loads configuration, boots the reference TCP host
//! and keeps it running until shutdown.

use std::sync::Arc;

use serde_json::json;
use tracing_subscriber::{EnvFilter, fmt};

use kindling_core::config::BootConfig;
use kindling_core::error::BootError;
use kindling_runtime::{Orchestrator, TcpHost};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> Result<BootConfig, BootError> {
    let env = std::env::var("KINDLING_ENV").unwrap_or_else(|_| "development".to_string());
    BootConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &BootConfig) {
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

/// Main server run function
async fn run(config: BootConfig) -> Result<(), BootError> {
    tracing::info!("Starting Kindling v{}", env!("CARGO_PKG_VERSION"));

    let host = Arc::new(TcpHost::default());
    let orchestrator = Orchestrator::new(host.clone());

    let options = json!({ "config": serde_json::to_value(&config)? });
    let handle = orchestrator.launch(options).await?;

    tracing::info!(
        boot_id = %handle.boot_id,
        addrs = ?host.local_addrs(),
        "Kindling is running"
    );

    shutdown_signal().await;
    tracing::info!("Shutdown signal received, starting graceful shutdown...");

    let _ = tokio::time::timeout(std::time::Duration::from_secs(10), host.shutdown()).await;

    tracing::info!("Kindling server shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
