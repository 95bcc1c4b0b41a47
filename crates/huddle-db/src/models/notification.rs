use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct NotificationModel {
    pub id: i64,
    pub recipient_id: i64,
    /// `NotificationKind` in snake_case
    pub kind: String,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<i64>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}
