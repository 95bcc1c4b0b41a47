//! Conversation and participant rows

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ConversationModel {
    pub id: i64,
    pub name: Option<String>,
    pub is_group: bool,
    pub admin_id: Option<i64>,
    pub description: Option<String>,
    pub last_message_id: Option<i64>,
    pub last_message_sender_id: Option<i64>,
    pub last_message_preview: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ParticipantModel {
    pub conversation_id: i64,
    pub user_id: i64,
    pub joined_at: DateTime<Utc>,
    pub unread_count: i32,
    pub last_read_message_id: Option<i64>,
}

/// Conversation joined with the requesting user's participant row
#[derive(Debug, Clone, FromRow)]
pub struct ConversationWithParticipantModel {
    #[sqlx(flatten)]
    pub conversation: ConversationModel,
    pub joined_at: DateTime<Utc>,
    pub unread_count: i32,
    pub last_read_message_id: Option<i64>,
    pub user_id: i64,
}
