//! Domain entities - core business objects

mod conversation;
mod message;
mod notification;
mod reaction;
mod user;

pub use conversation::{
    Conversation, LastMessage, Participant, LAST_MESSAGE_PREVIEW_LEN, MAX_GROUP_NAME_LEN,
};
pub use message::{
    extract_mentions, validate_content, validate_nonce, Message, DEFAULT_MAX_MESSAGE_LEN,
    MAX_NONCE_LEN,
};
pub use notification::{Notification, NotificationKind};
pub use reaction::{group_reactions, validate_emoji, Reaction, ReactionGroup, MAX_EMOJI_LEN};
pub use user::User;
