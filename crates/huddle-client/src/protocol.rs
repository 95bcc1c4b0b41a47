//! Gateway envelope and the events the client understands

use chrono::{DateTime, Utc};
use huddle_core::Snowflake;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::model::{Conversation, Message, Notification, Presence, Reaction, User};

/// Op codes of the `{op, t, s, d}` envelope
pub mod op {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const EVENT: u8 = 3;
    pub const RESUME: u8 = 6;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Close codes after which reconnecting cannot help
pub const FATAL_CLOSE_CODES: [u16; 3] = [4003, 4004, 4006];

/// Client→server event names
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
    pub const STATUS_UPDATE: &str = "status_update";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub op: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub t: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d: Option<Value>,
}

impl Frame {
    fn bare(op: u8, d: Option<Value>) -> Self {
        Self { op, t: None, s: None, d }
    }

    pub fn identify(token: &str) -> Self {
        Self::bare(op::IDENTIFY, Some(json!({ "token": token })))
    }

    pub fn resume(token: &str, session_id: &str, seq: u64) -> Self {
        Self::bare(
            op::RESUME,
            Some(json!({ "token": token, "session_id": session_id, "seq": seq })),
        )
    }

    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::bare(op::HEARTBEAT, Some(last_sequence.map_or(Value::Null, Value::from)))
    }

    pub fn event(name: &str, data: Value) -> Self {
        Self {
            op: op::EVENT,
            t: Some(name.to_string()),
            s: None,
            d: Some(data),
        }
    }

    pub fn send_message(conversation_id: Snowflake, content: &str, nonce: &str) -> Self {
        Self::event(
            names::SEND_MESSAGE,
            json!({ "conversation_id": conversation_id, "content": content, "nonce": nonce }),
        )
    }

    pub fn join(conversation_id: Snowflake) -> Self {
        Self::event(names::JOIN_CONVERSATION, json!({ "conversation_id": conversation_id }))
    }

    pub fn leave(conversation_id: Snowflake) -> Self {
        Self::event(names::LEAVE_CONVERSATION, json!({ "conversation_id": conversation_id }))
    }

    pub fn typing(conversation_id: Snowflake, is_typing: bool) -> Self {
        Self::event(
            names::TYPING,
            json!({ "conversation_id": conversation_id, "is_typing": is_typing }),
        )
    }

    /// `heartbeat_interval` of a Hello frame, in milliseconds
    pub fn heartbeat_interval(&self) -> Option<u64> {
        if self.op != op::HELLO {
            return None;
        }
        self.d.as_ref()?.get("heartbeat_interval")?.as_u64()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ready {
    pub v: u8,
    pub session_id: String,
    pub user: User,
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Resumed {
    pub session_id: String,
    pub replayed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageSent {
    #[serde(default)]
    pub nonce: Option<String>,
    pub message: Message,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MessageError {
    pub event: String,
    pub code: String,
    pub reason: String,
    #[serde(default)]
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MessageDeleted {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReactionUpdated {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePinned {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub pinned: bool,
    #[serde(default)]
    pub pinned_by: Option<Snowflake>,
    #[serde(default)]
    pub pinned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Typing {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub is_typing: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemberAdded {
    pub conversation_id: Snowflake,
    pub user: User,
    #[serde(default)]
    pub added_by: Option<Snowflake>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MemberRemoved {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    #[serde(default)]
    pub removed_by: Option<Snowflake>,
    #[serde(default)]
    pub new_admin_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ConversationDeleted {
    pub conversation_id: Snowflake,
}

/// A decoded dispatch
#[derive(Debug, Clone)]
pub enum ServerEvent {
    Ready(Box<Ready>),
    Resumed(Resumed),
    ReceiveMessage(Box<Message>),
    MessageSent(Box<MessageSent>),
    MessageError(MessageError),
    MessageEdited(Box<Message>),
    MessageDeleted(MessageDeleted),
    ReactionUpdated(ReactionUpdated),
    MessagePinned(MessagePinned),
    UserTyping(Typing),
    UserStatus(Presence),
    UserStatusChanged(Presence),
    NewNotification(Notification),
    MemberAdded(MemberAdded),
    MemberRemoved(MemberRemoved),
    ConversationCreated(Box<Conversation>),
    ConversationUpdated(Box<Conversation>),
    ConversationDeleted(ConversationDeleted),
    /// A dispatch this client version does not know
    Unknown { name: String, data: Value },
}

impl ServerEvent {
    pub fn parse(name: &str, data: Value) -> Result<Self, serde_json::Error> {
        fn de<T: DeserializeOwned>(data: Value) -> Result<T, serde_json::Error> {
            serde_json::from_value(data)
        }

        Ok(match name {
            "ready" => Self::Ready(Box::new(de(data)?)),
            "resumed" => Self::Resumed(de(data)?),
            "receive_message" => Self::ReceiveMessage(Box::new(de(data)?)),
            "message_sent" => Self::MessageSent(Box::new(de(data)?)),
            "message_error" => Self::MessageError(de(data)?),
            "message_edited" => Self::MessageEdited(Box::new(de(data)?)),
            "message_deleted" => Self::MessageDeleted(de(data)?),
            "reaction_updated" => Self::ReactionUpdated(de(data)?),
            "message_pinned" => Self::MessagePinned(de(data)?),
            "user_typing" => Self::UserTyping(de(data)?),
            "user_status" => Self::UserStatus(de(data)?),
            "user_status_changed" => Self::UserStatusChanged(de(data)?),
            "new_notification" => Self::NewNotification(de(data)?),
            "member_added" => Self::MemberAdded(de(data)?),
            "member_removed" => Self::MemberRemoved(de(data)?),
            "conversation_created" => Self::ConversationCreated(Box::new(de(data)?)),
            "conversation_updated" => Self::ConversationUpdated(Box::new(de(data)?)),
            "conversation_deleted" => Self::ConversationDeleted(de(data)?),
            other => Self::Unknown {
                name: other.to_string(),
                data,
            },
        })
    }

    /// Conversation the event belongs to, if any
    pub fn conversation_id(&self) -> Option<Snowflake> {
        match self {
            Self::ReceiveMessage(m) | Self::MessageEdited(m) => Some(m.conversation_id),
            Self::MessageSent(sent) => Some(sent.message.conversation_id),
            Self::MessageDeleted(e) => Some(e.conversation_id),
            Self::ReactionUpdated(e) => Some(e.conversation_id),
            Self::MessagePinned(e) => Some(e.conversation_id),
            Self::UserTyping(e) => Some(e.conversation_id),
            Self::MemberAdded(e) => Some(e.conversation_id),
            Self::MemberRemoved(e) => Some(e.conversation_id),
            Self::ConversationCreated(c) | Self::ConversationUpdated(c) => Some(c.id),
            Self::ConversationDeleted(e) => Some(e.conversation_id),
            Self::NewNotification(n) => n.conversation_id,
            _ => None,
        }
    }
}
