//! Persistent connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track open socket and WebSocket connections per application
//! - Hand out outbound channels handlers can write to directly
//! - Remove each connection exactly once when it closes
//!
//! # Design Decisions
//! - One registry per application instance, never a process-wide map
//! - Broadcast iterates a snapshot; a concurrent disconnect is a
//!   best-effort miss, not an error

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::observability::metrics;
use crate::pipeline::TransportKind;

/// Unique identifier for a connection within one registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A message queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Message(String),
    Close,
}

/// Handle to an open connection. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    transport: TransportKind,
    peer: Option<SocketAddr>,
    tx: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Queue a message. Returns false once the writer has gone away.
    pub fn send(&self, message: impl Into<String>) -> bool {
        self.tx.send(Outbound::Message(message.into())).is_ok()
    }

    /// Ask the writer to close the connection after pending messages.
    pub fn close(&self) {
        let _ = self.tx.send(Outbound::Close);
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Open connections of one application.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: AtomicU64,
    connections: Arc<DashMap<ConnectionId, Connection>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection.
    ///
    /// The guard removes the connection when dropped; the receiver feeds the
    /// connection's writer task.
    pub fn register(
        &self,
        transport: TransportKind,
        peer: Option<SocketAddr>,
    ) -> (ConnectionGuard, mpsc::UnboundedReceiver<Outbound>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Connection {
            id,
            transport,
            peer,
            tx,
        };
        self.connections.insert(id, connection.clone());
        metrics::connection_opened(transport);
        tracing::debug!(
            connection_id = %id,
            transport = %transport,
            active = self.connections.len(),
            "Connection registered"
        );
        let guard = ConnectionGuard {
            connections: Arc::clone(&self.connections),
            connection,
        };
        (guard, rx)
    }

    /// Remove a connection. Returns true only for the call that removed it.
    pub fn remove(&self, id: ConnectionId) -> bool {
        remove_from(&self.connections, id)
    }

    pub fn get(&self, id: ConnectionId) -> Option<Connection> {
        self.connections.get(&id).map(|c| c.value().clone())
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Point-in-time copy of every open connection.
    pub fn snapshot(&self) -> Vec<Connection> {
        self.connections.iter().map(|c| c.value().clone()).collect()
    }

    /// Send `message` to every open connection; returns how many accepted it.
    pub fn broadcast(&self, message: &str) -> usize {
        self.snapshot()
            .iter()
            .filter(|c| c.send(message))
            .count()
    }

    /// Send `message` to the listed connections; unknown ids are skipped.
    pub fn send_to(&self, ids: &[ConnectionId], message: &str) -> usize {
        ids.iter()
            .filter_map(|id| self.get(*id))
            .filter(|c| c.send(message))
            .count()
    }
}

fn remove_from(connections: &DashMap<ConnectionId, Connection>, id: ConnectionId) -> bool {
    match connections.remove(&id) {
        Some((_, connection)) => {
            metrics::connection_closed(connection.transport);
            tracing::debug!(
                connection_id = %id,
                active = connections.len(),
                "Connection removed"
            );
            true
        }
        None => false,
    }
}

/// Keeps a connection registered for its lifetime.
/// Removes it from the registry when dropped.
#[derive(Debug)]
pub struct ConnectionGuard {
    connections: Arc<DashMap<ConnectionId, Connection>>,
    connection: Connection,
}

impl ConnectionGuard {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn id(&self) -> ConnectionId {
        self.connection.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        remove_from(&self.connections, self.connection.id);
    }
}
