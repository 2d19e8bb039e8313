//! Connection registry
//!
//! Tracks every live connection in registration order. Membership changes only
//! through [`Registry::register`] and [`Registry::unregister`]; readers take a
//! point-in-time [`Registry::snapshot`] so concurrent removals never disturb an
//! iteration in progress.

use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};
use uuid::Uuid;

use super::Connection;

/// Registry of live connections
///
/// A cheap handle: clones share the same membership. Each server (or room)
/// owns its own registry; there is no process-wide instance.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    /// Live connections, oldest first (thread-safe via RwLock)
    connections: Arc<RwLock<Vec<Connection>>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection whose outbound messages go to `outbound`
    ///
    /// Assigns the id and makes the connection visible to every later snapshot.
    pub async fn register(&self, outbound: mpsc::UnboundedSender<Message>) -> Connection {
        let connection = Connection::new(outbound);
        let count = {
            let mut connections = self.connections.write().await;
            connections.push(connection.clone());
            connections.len()
        };
        info!(
            "Connection {} registered ({} live)",
            connection.id(),
            count
        );
        connection
    }

    /// Remove the connection with the given id
    ///
    /// Idempotent: returns `false` and changes nothing if it is not present.
    pub async fn unregister(&self, id: Uuid) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.write().await;
            let before = connections.len();
            connections.retain(|c| c.id() != id);
            (connections.len() != before, connections.len())
        };

        if removed {
            info!("Connection {} unregistered ({} live)", id, count);
        } else {
            debug!("Connection {} already unregistered", id);
        }
        removed
    }

    /// Copy of the current membership, oldest first
    pub async fn snapshot(&self) -> Vec<Connection> {
        self.connections.read().await.clone()
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Check if a connection is registered
    #[allow(dead_code)]
    pub async fn contains(&self, id: Uuid) -> bool {
        self.connections.read().await.iter().any(|c| c.id() == id)
    }
}
