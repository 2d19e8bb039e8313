//! A single live client connection
//!
//! Holds the connection's identity, its lifecycle state and the sending half of
//! its outbound queue. The queue is drained by the connection's own receive loop,
//! which is the only task that ever writes to the socket.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

/// Errors that can occur when handing a message to a recipient
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Connection {0} is no longer accepting messages")]
    Disconnected(Uuid),
}

/// Lifecycle state of a connection
///
/// `Open -> Closing -> Closed`; nothing leaves `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Upgraded and eligible for broadcasts
    Open,
    /// A close frame was sent or received, or the transport failed
    Closing,
    /// Torn down and removed from the registry
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Open => "open",
            ConnectionState::Closing => "closing",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Handle to one client connection
///
/// Cloning is cheap; every clone refers to the same state and outbound queue.
#[derive(Debug, Clone)]
pub struct Connection {
    id: Uuid,
    state: Arc<RwLock<ConnectionState>>,
    outbound: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Create an `Open` connection with a fresh id. Only the registry calls this.
    pub(super) fn new(outbound: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: Arc::new(RwLock::new(ConnectionState::Open)),
            outbound,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn is_open(&self) -> bool {
        self.state().await == ConnectionState::Open
    }

    /// Move `Open -> Closing`
    ///
    /// Returns `false` when the connection had already left `Open`, so only the
    /// first trigger performs the close handshake.
    pub async fn begin_close(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == ConnectionState::Open {
            *state = ConnectionState::Closing;
            true
        } else {
            false
        }
    }

    /// Move to the terminal `Closed` state
    pub async fn mark_closed(&self) {
        *self.state.write().await = ConnectionState::Closed;
    }

    /// Queue a message for this connection's writer without waiting
    ///
    /// The queue is unbounded; only a writer that has gone away refuses it.
    pub fn deliver(&self, message: Message) -> Result<(), DeliveryError> {
        self.outbound
            .send(message)
            .map_err(|_| DeliveryError::Disconnected(self.id))
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}
