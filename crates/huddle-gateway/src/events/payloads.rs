//! Payloads of the events the gateway itself dispatches

use huddle_service::dto::{ConversationResponse, UserResponse};
use serde::{Deserialize, Serialize};

/// Gateway protocol version reported in `ready`
pub const PROTOCOL_VERSION: u8 = 1;

/// `ready`, sent after a successful Identify
#[derive(Debug, Clone, Serialize)]
pub struct ReadyPayload {
    pub v: u8,
    pub session_id: String,
    pub user: UserResponse,
    /// Conversations the user can join, newest activity first
    pub conversations: Vec<ConversationResponse>,
}

impl ReadyPayload {
    #[must_use]
    pub fn new(session_id: String, user: UserResponse, conversations: Vec<ConversationResponse>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            session_id,
            user,
            conversations,
        }
    }
}

/// `resumed`, sent once the missed events have been replayed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumedPayload {
    pub session_id: String,
    pub replayed: usize,
}

/// `message_error`, the per-event failure acknowledgement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageErrorPayload {
    /// Event that failed
    pub event: String,
    pub code: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

impl MessageErrorPayload {
    pub fn new(
        event: impl Into<String>,
        code: impl Into<String>,
        reason: impl Into<String>,
        nonce: Option<String>,
    ) -> Self {
        Self {
            event: event.into(),
            code: code.into(),
            reason: reason.into(),
            nonce,
        }
    }
}
