//! Live player connections.
//!
//! One outbound channel per authenticated player. A newer connection for the
//! same player replaces the older one; unregistering with a stale connection
//! id is a no-op so a late socket close cannot evict its replacement.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::protocol::ServerMessage;
use crate::PlayerId;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Generate unique connection ID
#[inline]
pub fn generate_connection_id() -> u64 {
    CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Receiving half handed to the transport writer task.
pub type Outbound = mpsc::UnboundedReceiver<ServerMessage>;

/// A player's live connection.
#[derive(Debug)]
pub struct Connection {
    pub id: u64,
    pub player_id: PlayerId,
    pub display_name: String,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn send(&self, msg: ServerMessage) -> bool {
        self.sender.send(msg).is_ok()
    }
}

/// Connection registry
pub struct ConnectionRegistry {
    connections: DashMap<PlayerId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
        }
    }

    /// Register a connection; returns its id and the outbound receiver.
    pub fn register(&self, player_id: PlayerId, display_name: String) -> (u64, Outbound) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = generate_connection_id();
        let previous = self.connections.insert(
            player_id,
            Connection {
                id,
                player_id,
                display_name,
                sender,
            },
        );
        if let Some(previous) = previous {
            tracing::debug!(player_id, replaced = previous.id, conn = id, "connection replaced");
        }
        (id, receiver)
    }

    /// Remove the player's connection if it is still `conn_id`.
    pub fn unregister(&self, player_id: PlayerId, conn_id: u64) -> bool {
        self.connections
            .remove_if(&player_id, |_, conn| conn.id == conn_id)
            .is_some()
    }

    /// Push a message; `false` if the player has no live connection.
    pub fn send(&self, player_id: PlayerId, msg: ServerMessage) -> bool {
        match self.connections.get(&player_id) {
            Some(conn) => conn.send(msg),
            None => false,
        }
    }

    pub fn send_many<'a, I>(&self, players: I, msg: &ServerMessage)
    where
        I: IntoIterator<Item = &'a PlayerId>,
    {
        for player_id in players {
            self.send(*player_id, msg.clone());
        }
    }

    pub fn is_connected(&self, player_id: PlayerId) -> bool {
        self.connections.contains_key(&player_id)
    }

    pub fn display_name(&self, player_id: PlayerId) -> Option<String> {
        self.connections
            .get(&player_id)
            .map(|c| c.display_name.clone())
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.connections.iter().map(|r| *r.key()).collect()
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
