//! Message and reaction mappers

use huddle_core::entities::{Message, Reaction};
use huddle_core::value_objects::Snowflake;

use crate::models::{MessageModel, ReactionModel};

impl From<MessageModel> for Message {
    fn from(model: MessageModel) -> Self {
        Message {
            id: Snowflake::new(model.id),
            conversation_id: Snowflake::new(model.conversation_id),
            sender_id: Snowflake::new(model.sender_id),
            pinned: model.is_pinned(),
            content: model.content,
            nonce: model.nonce,
            created_at: model.created_at,
            edited: model.edited_at.is_some(),
            edited_at: model.edited_at,
            pinned_at: model.pinned_at,
            pinned_by: model.pinned_by.map(Snowflake::new),
            deleted_at: model.deleted_at,
        }
    }
}

impl From<ReactionModel> for Reaction {
    fn from(model: ReactionModel) -> Self {
        Reaction {
            message_id: Snowflake::new(model.message_id),
            user_id: Snowflake::new(model.user_id),
            emoji: model.emoji,
            created_at: model.created_at,
        }
    }
}

pub struct MessageInsert<'a> {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: &'a str,
    pub nonce: Option<&'a str>,
}

impl<'a> MessageInsert<'a> {
    pub fn new(message: &'a Message) -> Self {
        Self {
            id: message.id.into_inner(),
            conversation_id: message.conversation_id.into_inner(),
            sender_id: message.sender_id.into_inner(),
            content: &message.content,
            nonce: message.nonce.as_deref(),
        }
    }
}
