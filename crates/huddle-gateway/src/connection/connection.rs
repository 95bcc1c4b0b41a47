//! Individual WebSocket connection
//!
//! Represents a single WebSocket connection and its state.

use crate::protocol::GatewayMessage;
use huddle_cache::SessionEvent;
use huddle_core::Snowflake;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex, RwLock};

use super::room::{RoomGuard, RoomIndex};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Connection established, waiting for Identify or Resume
    Connecting,
    /// Successfully authenticated
    Connected,
    /// Connection is closed
    Disconnected,
}

/// A single WebSocket connection
pub struct Connection {
    /// Unique session ID
    session_id: String,

    /// Authenticated user ID (None until Identify)
    user_id: RwLock<Option<Snowflake>>,

    state: RwLock<ConnectionState>,

    /// Channel to the socket writer task
    sender: mpsc::Sender<GatewayMessage>,

    /// Last sequence number sent
    sequence: AtomicU64,

    /// Serializes sequence assignment with the hand-off to the writer
    dispatch_lock: Mutex<()>,

    /// Last heartbeat received
    last_heartbeat: RwLock<Instant>,

    /// Conversation rooms this connection joined
    rooms: RwLock<HashMap<Snowflake, RoomGuard>>,

    created_at: Instant,
}

impl Connection {
    /// Create a new connection
    pub fn new(session_id: String, sender: mpsc::Sender<GatewayMessage>) -> Arc<Self> {
        Arc::new(Self {
            session_id,
            user_id: RwLock::new(None),
            state: RwLock::new(ConnectionState::Connecting),
            sender,
            sequence: AtomicU64::new(0),
            dispatch_lock: Mutex::new(()),
            last_heartbeat: RwLock::new(Instant::now()),
            rooms: RwLock::new(HashMap::new()),
            created_at: Instant::now(),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn user_id(&self) -> Option<Snowflake> {
        *self.user_id.read().await
    }

    pub async fn set_user_id(&self, user_id: Snowflake) {
        *self.user_id.write().await = Some(user_id);
    }

    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }

    pub async fn is_authenticated(&self) -> bool {
        self.user_id.read().await.is_some()
    }

    /// Last sequence number handed out
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }

    /// Send a Dispatch with the next sequence number; returns that number.
    ///
    /// Sequence numbers reach the writer in order even when the event
    /// dispatcher and the handler task dispatch concurrently.
    pub async fn dispatch(
        &self,
        event_type: &str,
        data: Value,
    ) -> Result<u64, mpsc::error::SendError<GatewayMessage>> {
        let _order = self.dispatch_lock.lock().await;
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        self.sender
            .send(GatewayMessage::dispatch(event_type, seq, data))
            .await?;
        Ok(seq)
    }

    /// Resend missed events under their original sequence numbers and
    /// continue numbering after them. `since` is the client's last seen
    /// sequence.
    pub async fn replay(
        &self,
        since: u64,
        events: Vec<SessionEvent>,
    ) -> Result<usize, mpsc::error::SendError<GatewayMessage>> {
        let _order = self.dispatch_lock.lock().await;
        let latest = events.last().map_or(since, |e| e.sequence);
        let count = events.len();
        for event in events {
            self.sender
                .send(GatewayMessage::dispatch(&event.event_type, event.sequence, event.data))
                .await?;
        }
        self.sequence.fetch_max(latest, Ordering::SeqCst);
        Ok(count)
    }

    /// Send a non-dispatch frame (Hello, HeartbeatAck, InvalidSession, ...)
    pub async fn send(&self, message: GatewayMessage) -> Result<(), mpsc::error::SendError<GatewayMessage>> {
        self.sender.send(message).await
    }

    pub async fn record_heartbeat(&self) {
        *self.last_heartbeat.write().await = Instant::now();
    }

    pub async fn time_since_heartbeat(&self) -> Duration {
        self.last_heartbeat.read().await.elapsed()
    }

    // === Rooms ===

    /// Enter a conversation room; returns false if already in it
    pub async fn join_room(&self, index: &Arc<RoomIndex>, conversation_id: Snowflake) -> bool {
        let mut rooms = self.rooms.write().await;
        if rooms.contains_key(&conversation_id) {
            return false;
        }
        rooms.insert(
            conversation_id,
            RoomGuard::enter(index, conversation_id, &self.session_id),
        );
        true
    }

    pub async fn leave_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.write().await.remove(&conversation_id).is_some()
    }

    pub async fn leave_all_rooms(&self) {
        self.rooms.write().await.clear();
    }

    pub async fn in_room(&self, conversation_id: Snowflake) -> bool {
        self.rooms.read().await.contains_key(&conversation_id)
    }

    pub async fn rooms(&self) -> Vec<Snowflake> {
        let mut rooms: Vec<Snowflake> = self.rooms.read().await.keys().copied().collect();
        rooms.sort();
        rooms
    }

    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .field("sequence", &self.sequence.load(Ordering::SeqCst))
            .field("created_at", &self.created_at)
            .finish()
    }
}
