//! Connection manager
//!
//! Manages all active WebSocket connections using DashMap for thread-safe access.

use super::room::RoomIndex;
use super::{Connection, ConnectionState};
use crate::protocol::GatewayMessage;
use huddle_core::Snowflake;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Manages all active WebSocket connections on this instance
pub struct ConnectionManager {
    /// Active connections by session ID
    connections: DashMap<String, Arc<Connection>>,

    /// User ID to session IDs mapping
    user_connections: DashMap<Snowflake, HashSet<String>>,

    /// Conversation rooms; entries are owned by the connections' room guards
    rooms: Arc<RoomIndex>,
}

impl ConnectionManager {
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            user_connections: DashMap::new(),
            rooms: Arc::new(RoomIndex::new()),
        }
    }

    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Register a new connection
    pub fn add_connection(
        &self,
        session_id: String,
        sender: mpsc::Sender<GatewayMessage>,
    ) -> Arc<Connection> {
        let connection = Connection::new(session_id.clone(), sender);
        self.connections.insert(session_id.clone(), Arc::clone(&connection));

        tracing::debug!(session_id = %session_id, "Connection added");

        connection
    }

    /// Remove a connection, leaving all of its rooms
    pub async fn remove_connection(&self, session_id: &str) {
        if let Some((_, connection)) = self.connections.remove(session_id) {
            connection.leave_all_rooms().await;

            if let Some(user_id) = connection.user_id().await {
                if let Some(mut sessions) = self.user_connections.get_mut(&user_id) {
                    sessions.remove(session_id);
                }
                self.user_connections
                    .remove_if(&user_id, |_, sessions| sessions.is_empty());
            }

            tracing::debug!(session_id = %session_id, "Connection removed");
        }
    }

    pub fn get_connection(&self, session_id: &str) -> Option<Arc<Connection>> {
        self.connections.get(session_id).map(|r| Arc::clone(r.value()))
    }

    /// Authenticate a connection (link to user)
    pub async fn authenticate_connection(&self, session_id: &str, user_id: Snowflake) -> bool {
        let Some(connection) = self.get_connection(session_id) else {
            return false;
        };
        connection.set_user_id(user_id).await;
        connection.set_state(ConnectionState::Connected).await;

        self.user_connections
            .entry(user_id)
            .or_default()
            .insert(session_id.to_string());

        tracing::debug!(
            session_id = %session_id,
            user_id = %user_id,
            "Connection authenticated"
        );
        true
    }

    /// Put a connection into a conversation room; false if already there
    pub async fn join_room(&self, connection: &Connection, conversation_id: Snowflake) -> bool {
        let joined = connection.join_room(&self.rooms, conversation_id).await;
        if joined {
            tracing::trace!(
                session_id = %connection.session_id(),
                conversation_id = %conversation_id,
                "Joined room"
            );
        }
        joined
    }

    pub async fn leave_room(&self, connection: &Connection, conversation_id: Snowflake) -> bool {
        connection.leave_room(conversation_id).await
    }

    /// Drop every session of a user from a room, e.g. after removal
    pub async fn evict_user(&self, conversation_id: Snowflake, user_id: Snowflake) -> usize {
        let mut evicted = 0;
        for connection in self.user_connections(user_id) {
            if connection.leave_room(conversation_id).await {
                evicted += 1;
            }
        }
        evicted
    }

    /// Empty a room entirely, e.g. after the conversation was deleted
    pub async fn evict_room(&self, conversation_id: Snowflake) -> usize {
        let mut evicted = 0;
        for connection in self.room_connections(conversation_id) {
            if connection.leave_room(conversation_id).await {
                evicted += 1;
            }
        }
        evicted
    }

    /// All connections of a user on this instance
    pub fn user_connections(&self, user_id: Snowflake) -> Vec<Arc<Connection>> {
        let sessions: Vec<String> = self
            .user_connections
            .get(&user_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        self.resolve(sessions)
    }

    /// Connections that joined a conversation room
    pub fn room_connections(&self, conversation_id: Snowflake) -> Vec<Arc<Connection>> {
        let sessions: Vec<String> = self
            .rooms
            .get(&conversation_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        self.resolve(sessions)
    }

    /// Connections that completed Identify or Resume
    pub async fn authenticated_connections(&self) -> Vec<Arc<Connection>> {
        let all: Vec<Arc<Connection>> = self.connections.iter().map(|c| Arc::clone(c.value())).collect();
        let mut authenticated = Vec::with_capacity(all.len());
        for connection in all {
            if connection.is_authenticated().await {
                authenticated.push(connection);
            }
        }
        authenticated
    }

    fn resolve(&self, sessions: Vec<String>) -> Vec<Arc<Connection>> {
        sessions
            .iter()
            .filter_map(|sid| self.get_connection(sid))
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn user_count(&self) -> usize {
        self.user_connections.len()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_user_online(&self, user_id: Snowflake) -> bool {
        self.user_connections.contains_key(&user_id)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.connections.len())
            .field("users", &self.user_connections.len())
            .field("rooms", &self.rooms.len())
            .finish()
    }
}
