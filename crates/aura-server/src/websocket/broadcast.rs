//! Fan-out of serialized events to connected clients.

use std::collections::HashMap;
use std::sync::Arc;

use aura_core::ids::{ConnectionId, SessionId};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::connection::ClientConnection;

/// Registry of live connections.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection.
    pub async fn add(&self, connection: Arc<ClientConnection>) {
        let mut conns = self.connections.write().await;
        let _ = conns.insert(connection.id.clone(), connection);
    }

    /// Forget a connection.
    pub async fn remove(&self, connection_id: &ConnectionId) {
        let mut conns = self.connections.write().await;
        let _ = conns.remove(connection_id);
    }

    /// Send `message` to every connection observing `session_id`.
    /// Returns the number of connections it was queued for.
    pub async fn send_to_session(&self, session_id: &SessionId, message: &Arc<String>) -> usize {
        let conns = self.connections.read().await;
        let mut delivered = 0;
        for conn in conns.values().filter(|c| c.observes(session_id)) {
            if conn.send(Arc::clone(message)) {
                delivered += 1;
            } else {
                warn!(conn_id = %conn.id, session_id = %session_id, "failed to send event to client");
            }
        }
        debug!(session_id = %session_id, delivered, "event fanned out to session");
        delivered
    }

    /// Send `message` to one connection. Returns `false` if it is gone or
    /// its queue is full.
    pub async fn send_to_connection(&self, connection_id: &ConnectionId, message: Arc<String>) -> bool {
        let conns = self.connections.read().await;
        match conns.get(connection_id) {
            Some(conn) => conn.send(message),
            None => {
                debug!(conn_id = %connection_id, "target connection is gone");
                false
            }
        }
    }

    /// Number of live connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Connections observing `session_id`.
    pub async fn session_connections(&self, session_id: &SessionId) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| c.observes(session_id))
            .cloned()
            .collect()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}
