use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use rateguard::config::RateguardConfig;
use rateguard::http::{AppState, HttpServer};

/// Log output format.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// API admission control service.
#[derive(Debug, Parser)]
#[command(name = "rateguard", version, about)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long, env = "RATEGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match args.log_format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(true)
            .init(),
    }

    info!("Starting RateGuard admission control service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = RateguardConfig::load(args.config.as_deref())?;
    info!(
        app_name = %config.server.app_name,
        http_addr = %config.server.http_addr,
        backend = ?config.store.backend,
        limit = config.rate_limiting.limit,
        window_secs = config.rate_limiting.window_secs,
        failure_policy = ?config.rate_limiting.failure_policy,
        "Configuration loaded"
    );

    let state = AppState::from_config(&config).await?;
    info!("Admission policy initialized");

    let server = HttpServer::new(config.server.http_addr, config.server.api_prefix.clone(), state);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("RateGuard service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
