//! Client → server events

use huddle_core::{PresenceStatus, Snowflake};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

pub mod names {
    pub const JOIN_CONVERSATION: &str = "join_conversation";
    pub const LEAVE_CONVERSATION: &str = "leave_conversation";
    pub const SEND_MESSAGE: &str = "send_message";
    pub const EDIT_MESSAGE: &str = "edit_message";
    pub const DELETE_MESSAGE: &str = "delete_message";
    pub const ADD_REACTION: &str = "add_reaction";
    pub const REMOVE_REACTION: &str = "remove_reaction";
    pub const PIN_MESSAGE: &str = "pin_message";
    pub const TYPING: &str = "typing";
    pub const USER_ONLINE: &str = "user_online";
    pub const STATUS_UPDATE: &str = "status_update";
    pub const MEMBER_ADDED: &str = "member_added";
    pub const MEMBER_REMOVED: &str = "member_removed";
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationRef {
    pub conversation_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageRef {
    pub message_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendMessage {
    pub conversation_id: Snowflake,
    pub content: String,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EditMessage {
    pub message_id: Snowflake,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReactionEvent {
    pub message_id: Snowflake,
    pub emoji: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PinMessage {
    pub message_id: Snowflake,
    /// Absent toggles
    #[serde(default)]
    pub pinned: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypingEvent {
    pub conversation_id: Snowflake,
    pub is_typing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StatusUpdate {
    pub status: PresenceStatus,
    #[serde(default)]
    pub custom_status: Option<String>,
}

/// Client-reported membership change; only a hint, storage decides
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MembershipEvent {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    JoinConversation(ConversationRef),
    LeaveConversation(ConversationRef),
    SendMessage(SendMessage),
    EditMessage(EditMessage),
    DeleteMessage(MessageRef),
    AddReaction(ReactionEvent),
    RemoveReaction(ReactionEvent),
    PinMessage(PinMessage),
    Typing(TypingEvent),
    /// Whatever the payload claims, this marks the session's own user online
    UserOnline,
    StatusUpdate(StatusUpdate),
    MemberAdded(MembershipEvent),
    MemberRemoved(MembershipEvent),
}

#[derive(Debug, Error)]
pub enum ClientEventError {
    #[error("Unknown event: {0}")]
    UnknownEvent(String),

    #[error("Invalid {event} payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientEventError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownEvent(_) => "UNKNOWN_EVENT",
            Self::InvalidPayload { .. } => "INVALID_PAYLOAD",
        }
    }
}

fn parse<T: DeserializeOwned>(event: &str, data: Value) -> Result<T, ClientEventError> {
    serde_json::from_value(data).map_err(|source| ClientEventError::InvalidPayload {
        event: event.to_string(),
        source,
    })
}

impl ClientEvent {
    pub fn parse(name: &str, data: Value) -> Result<Self, ClientEventError> {
        use names::*;

        let event = match name {
            JOIN_CONVERSATION => Self::JoinConversation(parse(name, data)?),
            LEAVE_CONVERSATION => Self::LeaveConversation(parse(name, data)?),
            SEND_MESSAGE => Self::SendMessage(parse(name, data)?),
            EDIT_MESSAGE => Self::EditMessage(parse(name, data)?),
            DELETE_MESSAGE => Self::DeleteMessage(parse(name, data)?),
            ADD_REACTION => Self::AddReaction(parse(name, data)?),
            REMOVE_REACTION => Self::RemoveReaction(parse(name, data)?),
            PIN_MESSAGE => Self::PinMessage(parse(name, data)?),
            TYPING => Self::Typing(parse(name, data)?),
            USER_ONLINE => Self::UserOnline,
            STATUS_UPDATE => Self::StatusUpdate(parse(name, data)?),
            MEMBER_ADDED => Self::MemberAdded(parse(name, data)?),
            MEMBER_REMOVED => Self::MemberRemoved(parse(name, data)?),
            other => return Err(ClientEventError::UnknownEvent(other.to_string())),
        };
        Ok(event)
    }

    /// Conversation the event concerns, when it names one directly
    #[must_use]
    pub fn conversation_id(&self) -> Option<Snowflake> {
        match self {
            Self::JoinConversation(e) | Self::LeaveConversation(e) => Some(e.conversation_id),
            Self::SendMessage(e) => Some(e.conversation_id),
            Self::Typing(e) => Some(e.conversation_id),
            Self::MemberAdded(e) | Self::MemberRemoved(e) => Some(e.conversation_id),
            _ => None,
        }
    }
}

/// Client correlation id carried by any event payload
#[must_use]
pub(crate) fn nonce_of(data: &Value) -> Option<String> {
    data.get("nonce").and_then(Value::as_str).map(str::to_string)
}
