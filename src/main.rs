//! Relay Hub
//!
//! WebSocket broadcast hub. Every text message a client sends is relayed to all
//! other connected clients.

mod config;
mod hub;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use config::HubConfig;
use server::{ServerConfig, WebSocketServer};

/// Relay Hub
///
/// WebSocket broadcast hub for multi-party chat
#[derive(Parser, Debug)]
#[command(name = "relay-hub")]
#[command(version, about, long_about = None)]
struct Args {
    /// Port to listen on [default: 5263]
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address [default: 127.0.0.1]
    #[arg(long)]
    bind: Option<String>,

    /// Path accepting WebSocket upgrades [default: /ws]
    #[arg(long)]
    path: Option<String>,

    /// Config file (defaults to ./relay-hub.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Apply command line overrides on top of file settings
    fn apply(self, mut settings: HubConfig) -> HubConfig {
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(bind) = self.bind {
            settings.bind = bind;
        }
        if let Some(path) = self.path {
            settings.path = path;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging; RUST_LOG takes precedence over --verbose
    let log_level = if args.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    info!("Relay Hub v{}", env!("CARGO_PKG_VERSION"));

    let settings = match &args.config {
        Some(path) => HubConfig::load(path)?,
        None => HubConfig::load_from_dir(&std::env::current_dir()?)?,
    };
    let settings = args.apply(settings);
    settings.validate()?;

    let config = ServerConfig::from(settings);

    // Create and start the WebSocket server
    let server = Arc::new(WebSocketServer::new(config));
    let server_handle = Arc::clone(&server);

    // Spawn shutdown signal handler
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Initiating graceful shutdown...");
        server_handle.shutdown();
    });

    // Run the server
    server.run().await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
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
            info!("Received SIGINT (Ctrl+C)");
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_defaults_leave_file_settings() {
        let args = Args::parse_from(["relay-hub"]);
        let settings = HubConfig {
            port: 9100,
            ..HubConfig::default()
        };
        assert_eq!(args.apply(settings.clone()), settings);
    }

    #[test]
    fn test_args_override_file_settings() {
        let args = Args::parse_from([
            "relay-hub",
            "--port",
            "7000",
            "--bind",
            "0.0.0.0",
            "--path",
            "/chat",
        ]);
        let settings = args.apply(HubConfig::default());
        assert_eq!(settings.port, 7000);
        assert_eq!(settings.bind, "0.0.0.0");
        assert_eq!(settings.path, "/chat");
    }

    #[test]
    fn test_args_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
