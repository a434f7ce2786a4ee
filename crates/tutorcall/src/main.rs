mod app;
mod config;
mod credentials;
mod handlers;
mod state;
mod storage;

use anyhow::Result;
use clap::Parser;
use listenfd::ListenFd;
use tokio::{net::TcpListener, signal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    app::create_app,
    config::{Config, LogFormat},
    state::AppState,
};

/// tutorcall - Backend for spoken English practice calls
#[derive(Parser, Debug)]
#[command(name = "tutorcall")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Host address to bind the server to
    #[arg(long, short = 'H', default_value = "0.0.0.0", env = "HOST")]
    host: String,

    /// Port to listen on
    #[arg(long, short, default_value = "3000", env = "PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env();

    // Initialize tracing subscriber
    let json_logs = config.log_format == LogFormat::Json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tutorcall=debug,tower_http=debug".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!(
        storage = %config.storage_backend,
        table = %config.table_name,
        retention_days = config.retention_days,
        "Loaded configuration"
    );

    let state = AppState::from_config(&config).await;

    // Build the application router
    let app = create_app(state);

    // Auto-reload support via listenfd
    let mut listenfd = ListenFd::from_env();
    let listener = match listenfd.take_tcp_listener(0)? {
        // If we are given a tcp listener on listen fd 0, use that one
        Some(listener) => {
            listener.set_nonblocking(true)?;
            TcpListener::from_std(listener)?
        }
        // Otherwise fall back to CLI-specified host:port
        None => {
            let addr = format!("{}:{}", cli.host, cli.port);
            TcpListener::bind(&addr).await?
        }
    };

    tracing::info!("listening on {}", listener.local_addr()?);

    // Run the server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// Wait for shutdown signals (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down...");
        }
    }
}
