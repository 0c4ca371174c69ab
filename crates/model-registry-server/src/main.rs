//! Model Registry Server
//!
//! Main entry point for the model registry HTTP server.
//! This binary wires the in-memory registry, the import/export services and
//! the HTTP surface together and serves them with graceful shutdown.

mod config;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use model_registry_api::build_api_server_with_config;
use model_registry_core::{Event, Severity};
use model_registry_service::ServiceRegistryBuilder;
use model_registry_store::{BroadcastEventPublisher, InMemoryRegistry};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use config::ServerConfig;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration directory
    #[arg(short, long, env = "CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment (development, production, etc.)
    #[arg(short, long, env = "ENVIRONMENT", default_value = "development")]
    environment: String,

    /// Server host
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Server port
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(long, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Directory generated spreadsheet packages are cached in
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Parent directory of scratch space
    #[arg(long)]
    temp_root: Option<PathBuf>,

    /// Root SVG references are resolved against
    #[arg(long)]
    svg_asset_root: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(log_level) = self.log_level {
            config.logging.level = log_level;
        }
        if let Some(dir) = self.cache_dir {
            config.pipeline.cache_dir = dir;
        }
        if let Some(dir) = self.temp_root {
            config.pipeline.temp_root = dir;
        }
        if let Some(dir) = self.svg_asset_root {
            config.pipeline.svg_asset_root = dir;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let environment = args.environment.clone();
    let mut config = ServerConfig::load_or_default(&args.config_dir, &environment);
    args.apply(&mut config);

    telemetry::init_with_config(telemetry::TelemetryConfig::from(&config.logging));

    info!("Starting model registry server");
    info!("Environment: {}", environment);
    info!("Server: {}", config.bind_address());
    info!(
        cache_dir = %config.pipeline.cache_dir.display(),
        temp_root = %config.pipeline.temp_root.display(),
        svg_asset_root = %config.pipeline.svg_asset_root.display(),
        "Pipeline directories"
    );

    let publisher = Arc::new(BroadcastEventPublisher::default());
    tokio::spawn(log_events(publisher.subscribe()));

    let services = ServiceRegistryBuilder::new()
        .registry(Arc::new(InMemoryRegistry::new()))
        .publisher(publisher)
        .config(config.pipeline.clone())
        .build()
        .context("Failed to build services")?;
    services.summary.refresh().await;

    let app = build_api_server_with_config(services, config.middleware());

    let http_addr: SocketAddr = config
        .bind_address()
        .parse()
        .context("Invalid HTTP bind address")?;

    let http_listener = tokio::net::TcpListener::bind(http_addr)
        .await
        .context("Failed to bind HTTP server")?;

    info!("HTTP Server listening on http://{}", http_addr);

    if config.server.graceful_shutdown {
        axum::serve(http_listener, app.into_make_service())
            .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_seconds))
            .await
            .context("HTTP Server error")?;
    } else {
        axum::serve(http_listener, app.into_make_service())
            .await
            .context("HTTP Server error")?;
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Write audit events to the log
async fn log_events(mut events: broadcast::Receiver<Event>) {
    loop {
        match events.recv().await {
            Ok(event) => log_event(&event),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Audit log fell behind, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &Event) {
    let actor = event.actor.as_deref().unwrap_or("-");
    match event.severity {
        Severity::Error => error!(
            target: "audit",
            actor,
            action = event.action.as_str(),
            metadata = ?event.metadata,
            "{}",
            event.description
        ),
        Severity::Warning => warn!(target: "audit", actor, action = event.action.as_str(), "{}", event.description),
        _ => info!(target: "audit", actor, action = event.action.as_str(), "{}", event.description),
    }
}

/// Graceful shutdown signal handler
///
/// Waits for SIGTERM or SIGINT (Ctrl+C) and then initiates graceful shutdown.
async fn shutdown_signal(timeout_seconds: u64) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for graceful shutdown", timeout_seconds);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let args = Args::parse_from([
            "model-registry-server",
            "--port",
            "8088",
            "--temp-root",
            "/var/tmp/registry",
        ]);
        let mut config = ServerConfig::default();
        args.apply(&mut config);

        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.pipeline.temp_root, PathBuf::from("/var/tmp/registry"));
    }
}
