//! Dispatch names shared by the services that publish and the gateway
//! that delivers. Clients see these verbatim in the envelope's `t` field.

pub const READY: &str = "ready";
pub const RESUMED: &str = "resumed";

pub const RECEIVE_MESSAGE: &str = "receive_message";
pub const MESSAGE_SENT: &str = "message_sent";
pub const MESSAGE_ERROR: &str = "message_error";
pub const MESSAGE_EDITED: &str = "message_edited";
pub const MESSAGE_DELETED: &str = "message_deleted";
pub const REACTION_UPDATED: &str = "reaction_updated";
pub const MESSAGE_PINNED: &str = "message_pinned";

pub const USER_TYPING: &str = "user_typing";
pub const USER_STATUS: &str = "user_status";
pub const USER_STATUS_CHANGED: &str = "user_status_changed";

pub const NEW_NOTIFICATION: &str = "new_notification";

pub const MEMBER_ADDED: &str = "member_added";
pub const MEMBER_REMOVED: &str = "member_removed";
pub const CONVERSATION_CREATED: &str = "conversation_created";
pub const CONVERSATION_UPDATED: &str = "conversation_updated";
pub const CONVERSATION_DELETED: &str = "conversation_deleted";
