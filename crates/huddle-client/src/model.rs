//! Wire shapes shared by REST bodies and gateway dispatches

use chrono::{DateTime, Utc};
use huddle_core::{NotificationKind, PresenceStatus, Snowflake};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Snowflake,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
}

impl User {
    /// Display name, falling back to the username
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Snowflake,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: CurrentUser,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub user_id: Snowflake,
    pub status: PresenceStatus,
    #[serde(default)]
    pub custom_status: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Directory entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserWithPresence {
    #[serde(flatten)]
    pub user: User,
    pub status: PresenceStatus,
    #[serde(default)]
    pub custom_status: Option<String>,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

impl UserWithPresence {
    pub fn presence(&self) -> Presence {
        Presence {
            user_id: self.user.id,
            status: self.status,
            custom_status: self.custom_status.clone(),
            last_seen: self.last_seen,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    pub user: User,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastMessage {
    pub message_id: Snowflake,
    pub sender_id: Snowflake,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Snowflake,
    pub name: Option<String>,
    pub is_group: bool,
    pub admin_id: Option<Snowflake>,
    pub description: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// For a 1:1, the participant who is not `me`
    pub fn other_participant(&self, me: Snowflake) -> Option<&User> {
        if self.is_group {
            return None;
        }
        self.participants
            .iter()
            .map(|p| &p.user)
            .find(|u| u.id != me)
    }

    /// Group name, or the other participant's name for a 1:1
    pub fn title(&self, me: Snowflake) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.is_empty()) {
            return name.to_string();
        }
        self.other_participant(me)
            .map(|u| u.label().to_string())
            .unwrap_or_default()
    }

    pub fn is_participant(&self, user_id: Snowflake) -> bool {
        self.participants.iter().any(|p| p.user.id == user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedConversation {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub created: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub user_id: Snowflake,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    #[serde(default)]
    pub sender: Option<User>,
    pub content: String,
    #[serde(default)]
    pub nonce: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub edited: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub pinned_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub pinned_by: Option<Snowflake>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub has_more: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Snowflake,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Snowflake>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationList {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MarkAllRead {
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn direct() -> Conversation {
        serde_json::from_value(json!({
            "id": "10",
            "name": null,
            "is_group": false,
            "admin_id": null,
            "description": null,
            "participants": [
                {"user": {"id": "1", "username": "amina"}, "joined_at": "2026-01-01T00:00:00Z", "is_admin": false},
                {"user": {"id": "2", "username": "bilal", "display_name": "Bilal H."}, "joined_at": "2026-01-01T00:00:00Z", "is_admin": false}
            ],
            "last_message": null,
            "unread_count": 0,
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap()
    }

    #[test]
    fn test_direct_title_is_the_other_participant() {
        let conversation = direct();
        assert_eq!(conversation.title(Snowflake::new(1)), "Bilal H.");
        assert_eq!(conversation.title(Snowflake::new(2)), "amina");
        assert!(conversation.is_participant(Snowflake::new(2)));
    }

    #[test]
    fn test_message_tolerates_missing_optionals() {
        let message: Message = serde_json::from_value(json!({
            "id": "5",
            "conversation_id": "10",
            "sender_id": "1",
            "content": "hello",
            "created_at": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(!message.edited);
        assert!(message.reactions.is_empty());
        assert_eq!(message.nonce, None);
    }
}
