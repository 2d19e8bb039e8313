//! Per-connection receive loop
//!
//! One [`ConnectionHandler`] runs per upgraded socket. It is the only writer to
//! that socket: broadcasts from other connections land in its outbound queue and
//! are written here in order, interleaved with reads from the peer.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, warn};

use super::protocol::{self, Inbound};
use crate::hub::{self, Connection, Registry};

/// How long a locally initiated close waits for the peer's reply
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Why a receive loop stopped
#[derive(Debug, Clone, PartialEq)]
pub enum ExitReason {
    /// Peer sent a close frame
    PeerClosed(Option<CloseFrame<'static>>),
    /// Stream ended without a close frame
    Dropped,
    /// Read or write failed
    TransportError(String),
    /// Server is shutting down
    Shutdown,
}

/// Handles a single WebSocket connection from registration to teardown
pub struct ConnectionHandler {
    connection: Connection,
    registry: Registry,
    outbound_rx: mpsc::UnboundedReceiver<Message>,
    shutdown_rx: broadcast::Receiver<()>,
    peer_addr: SocketAddr,
}

type Writer<T> = SplitSink<WebSocketStream<T>, Message>;
type Reader<T> = SplitStream<WebSocketStream<T>>;

impl ConnectionHandler {
    /// Register a new connection and prepare its handler
    pub async fn register(
        registry: Registry,
        shutdown_rx: broadcast::Receiver<()>,
        peer_addr: SocketAddr,
    ) -> Self {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connection = registry.register(outbound_tx).await;
        Self {
            connection,
            registry,
            outbound_rx,
            shutdown_rx,
            peer_addr,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Run until the connection is closed
    ///
    /// Unregistration and loop exit happen here and nowhere else, so the
    /// connection leaves the registry exactly when this returns.
    pub async fn run<T>(mut self, ws_stream: WebSocketStream<T>) -> ExitReason
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let reason = self.receive(&mut ws_sender, &mut ws_receiver).await;
        self.connection.begin_close().await;
        self.close_handshake(&reason, &mut ws_sender, &mut ws_receiver).await;

        self.registry.unregister(self.connection.id()).await;
        self.connection.mark_closed().await;

        info!(
            "Connection {} from {} {}: {:?}",
            self.connection.id(),
            self.peer_addr,
            self.connection.state().await,
            reason
        );
        reason
    }

    async fn receive<T>(
        &mut self,
        ws_sender: &mut Writer<T>,
        ws_receiver: &mut Reader<T>,
    ) -> ExitReason
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let id = self.connection.id();

        loop {
            tokio::select! {
                // Receive frames from the peer
                msg = ws_receiver.next() => {
                    match Inbound::from(msg) {
                        Inbound::Text(text) => {
                            debug!("Received message from {}: {}", id, text);
                            let report = hub::broadcast(&self.registry, id, &text).await;
                            if report.failed > 0 {
                                debug!(
                                    "{} of {} recipients of {} had already gone away",
                                    report.failed,
                                    report.delivered + report.failed,
                                    id
                                );
                            }
                        }
                        Inbound::Binary(len) => {
                            warn!("Received binary message from {} ({} bytes), ignoring", id, len);
                        }
                        Inbound::Ping(data) => {
                            if let Err(e) = ws_sender.send(Message::Pong(data)).await {
                                return ExitReason::TransportError(e.to_string());
                            }
                        }
                        Inbound::Ignored => {}
                        Inbound::Close(frame) => {
                            info!("Client {} requested close", id);
                            return ExitReason::PeerClosed(frame);
                        }
                        Inbound::Failed(e) => {
                            warn!("WebSocket error from {}: {}", id, e);
                            return ExitReason::TransportError(e.to_string());
                        }
                        Inbound::Ended => return ExitReason::Dropped,
                    }
                }
                // Write queued broadcasts
                Some(message) = self.outbound_rx.recv() => {
                    if let Err(e) = ws_sender.send(message).await {
                        warn!("Failed to write to {}: {}", id, e);
                        return ExitReason::TransportError(e.to_string());
                    }
                }
                // Handle shutdown signal
                _ = self.shutdown_rx.recv() => {
                    info!("Shutdown signal received, closing connection {}", id);
                    return ExitReason::Shutdown;
                }
            }
        }
    }

    async fn close_handshake<T>(
        &self,
        reason: &ExitReason,
        ws_sender: &mut Writer<T>,
        ws_receiver: &mut Reader<T>,
    ) where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        match reason {
            // tungstenite queued the echo of the peer's code and reason while
            // reading the close frame; closing the sink below flushes it
            ExitReason::PeerClosed(frame) => {
                debug!("Echoing close {:?} to {}", frame, self.connection.id());
            }
            ExitReason::Shutdown => {
                if ws_sender.send(protocol::shutdown_close()).await.is_ok() {
                    // Wait for the peer's close reply, then release the transport
                    let drain = async { while let Some(Ok(_)) = ws_receiver.next().await {} };
                    if tokio::time::timeout(CLOSE_TIMEOUT, drain).await.is_err() {
                        debug!("No close reply from {}, releasing", self.connection.id());
                    }
                }
            }
            ExitReason::Dropped | ExitReason::TransportError(_) => {}
        }
        if let Err(e) = ws_sender.close().await {
            debug!("Releasing transport of {}: {}", self.connection.id(), e);
        }
    }
}
