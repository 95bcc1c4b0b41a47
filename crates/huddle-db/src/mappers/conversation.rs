//! Conversation and participant mappers

use chrono::{DateTime, Utc};
use huddle_core::entities::{Conversation, LastMessage, Participant};
use huddle_core::value_objects::Snowflake;

use crate::models::{ConversationModel, ConversationWithParticipantModel, ParticipantModel};

impl From<ConversationModel> for Conversation {
    fn from(model: ConversationModel) -> Self {
        let last_message = match (
            model.last_message_id,
            model.last_message_sender_id,
            model.last_message_at,
        ) {
            (Some(message_id), Some(sender_id), Some(created_at)) => Some(LastMessage {
                message_id: Snowflake::new(message_id),
                sender_id: Snowflake::new(sender_id),
                preview: model.last_message_preview.unwrap_or_default(),
                created_at,
            }),
            _ => None,
        };

        Conversation {
            id: Snowflake::new(model.id),
            name: model.name,
            is_group: model.is_group,
            admin_id: model.admin_id.map(Snowflake::new),
            description: model.description,
            last_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

impl From<ParticipantModel> for Participant {
    fn from(model: ParticipantModel) -> Self {
        Participant {
            conversation_id: Snowflake::new(model.conversation_id),
            user_id: Snowflake::new(model.user_id),
            joined_at: model.joined_at,
            unread_count: model.unread_count,
            last_read_message_id: model.last_read_message_id.map(Snowflake::new),
        }
    }
}

impl From<ConversationWithParticipantModel> for (Conversation, Participant) {
    fn from(model: ConversationWithParticipantModel) -> Self {
        let participant = Participant {
            conversation_id: Snowflake::new(model.conversation.id),
            user_id: Snowflake::new(model.user_id),
            joined_at: model.joined_at,
            unread_count: model.unread_count,
            last_read_message_id: model.last_read_message_id.map(Snowflake::new),
        };
        (Conversation::from(model.conversation), participant)
    }
}

pub struct ConversationInsert<'a> {
    pub id: i64,
    pub name: Option<&'a str>,
    pub is_group: bool,
    pub admin_id: Option<i64>,
    pub description: Option<&'a str>,
}

impl<'a> ConversationInsert<'a> {
    pub fn new(conversation: &'a Conversation) -> Self {
        Self {
            id: conversation.id.into_inner(),
            name: conversation.name.as_deref(),
            is_group: conversation.is_group,
            admin_id: conversation.admin_id.map(Snowflake::into_inner),
            description: conversation.description.as_deref(),
        }
    }
}

/// Denormalized last-message columns of `conversations`
pub struct LastMessageColumns<'a> {
    pub message_id: i64,
    pub sender_id: i64,
    pub preview: &'a str,
    pub created_at: DateTime<Utc>,
}

impl<'a> LastMessageColumns<'a> {
    pub fn new(last: &'a LastMessage) -> Self {
        Self {
            message_id: last.message_id.into_inner(),
            sender_id: last.sender_id.into_inner(),
            preview: &last.preview,
            created_at: last.created_at,
        }
    }
}
