//! WebSocket server implementation
//!
//! Listens for TCP connections, upgrades requests on the configured path and
//! hands each upgraded socket to its own [`ConnectionHandler`] task.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Error as WsError;
use tracing::{debug, error, info, warn};

use super::handler::{ConnectionHandler, CLOSE_TIMEOUT};
use super::protocol::{self, DEFAULT_PATH, DEFAULT_PORT};
use crate::config::HubConfig;
use crate::hub::Registry;

/// Configuration for the WebSocket server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind: String,
    /// Port to listen on
    pub port: u16,
    /// Upgrade path
    pub path: String,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(bind: String, port: u16) -> Self {
        Self {
            bind,
            port,
            path: DEFAULT_PATH.to_string(),
        }
    }

    /// Set the upgrade path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new("127.0.0.1".to_string(), DEFAULT_PORT)
    }
}

impl From<HubConfig> for ServerConfig {
    fn from(config: HubConfig) -> Self {
        Self::new(config.bind, config.port).with_path(config.path)
    }
}

/// WebSocket server relaying text messages between its clients
pub struct WebSocketServer {
    config: ServerConfig,
    registry: Registry,
    shutdown_tx: broadcast::Sender<()>,
}

impl WebSocketServer {
    /// Create a new WebSocket server with an empty registry
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            config,
            registry: Registry::new(),
            shutdown_tx,
        }
    }

    /// Registry of this server's live connections
    #[allow(dead_code)]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Trigger server shutdown
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Bind to the configured address and serve until shutdown
    pub async fn run(&self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.config.socket_addr()).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener until shutdown
    ///
    /// On shutdown every live connection is asked to close; this waits briefly
    /// for them to leave the registry.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        info!("WebSocket server listening on ws://{}{}", addr, self.config.path);

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                // Accept new connections
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => {
                            let registry = self.registry.clone();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let config = self.config.clone();

                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, peer_addr, registry, config, shutdown_rx).await {
                                    error!("Connection error from {}: {}", peer_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                        }
                    }
                }
                // Handle shutdown signal
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received, stopping server");
                    break;
                }
            }
        }

        // Wait for active connections to finish their close handshakes
        let live = self.registry.len().await;
        if live > 0 {
            info!("Waiting for {} active connections to close...", live);
            let drained = async {
                while !self.registry.is_empty().await {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
            };
            if tokio::time::timeout(CLOSE_TIMEOUT * 2, drained).await.is_err() {
                warn!(
                    "{} connections still open at shutdown",
                    self.registry.len().await
                );
            }
        }

        Ok(())
    }
}

/// Upgrade a single TCP connection and run its receive loop
async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Registry,
    config: ServerConfig,
    shutdown_rx: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    debug!("New connection from {}", peer_addr);

    // Upgrade to WebSocket
    let path = config.path.as_str();
    let upgrade = accept_hdr_async(&mut stream, |request: &Request, response: Response| {
        protocol::check_path(request, response, path)
    })
    .await;

    let ws_stream = match upgrade {
        Ok(ws_stream) => ws_stream,
        Err(WsError::Http(response)) => {
            info!("Rejected upgrade from {} with {}", peer_addr, response.status());
            return Ok(());
        }
        Err(WsError::Protocol(e)) => {
            info!("Rejected non-upgrade request from {}: {}", peer_addr, e);
            stream.write_all(protocol::BAD_REQUEST_RESPONSE).await?;
            stream.shutdown().await?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    let handler = ConnectionHandler::register(registry, shutdown_rx, peer_addr).await;
    info!(
        "WebSocket connected: {} from {}",
        handler.connection().id(),
        peer_addr
    );
    handler.run(ws_stream).await;
    Ok(())
}
