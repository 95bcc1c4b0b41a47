//! Message and reaction rows

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub nonce: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pinned_by: Option<i64>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl MessageModel {
    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pinned_at.is_some()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct ReactionModel {
    pub message_id: i64,
    pub user_id: i64,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}
