//! Conversation rooms
//!
//! A room is the set of sessions that joined one conversation. Membership
//! is held by [`RoomGuard`]s owned by the connection, so a dropped
//! connection can never leave a stale entry behind.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use huddle_core::Snowflake;

/// Conversation id to the session ids in its room
pub type RoomIndex = DashMap<Snowflake, HashSet<String>>;

/// Membership of one session in one room; leaving happens on drop
#[derive(Debug)]
pub struct RoomGuard {
    index: Arc<RoomIndex>,
    conversation_id: Snowflake,
    session_id: String,
}

impl RoomGuard {
    pub fn enter(index: &Arc<RoomIndex>, conversation_id: Snowflake, session_id: &str) -> Self {
        index
            .entry(conversation_id)
            .or_default()
            .insert(session_id.to_string());
        Self {
            index: Arc::clone(index),
            conversation_id,
            session_id: session_id.to_string(),
        }
    }

    #[must_use]
    pub fn conversation_id(&self) -> Snowflake {
        self.conversation_id
    }
}

impl Drop for RoomGuard {
    fn drop(&mut self) {
        if let Some(mut sessions) = self.index.get_mut(&self.conversation_id) {
            sessions.remove(&self.session_id);
        }
        self.index
            .remove_if(&self.conversation_id, |_, sessions| sessions.is_empty());
    }
}
