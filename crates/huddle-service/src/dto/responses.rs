//! Response DTOs for API endpoints and event payloads
//!
//! The same structs are serialized into REST bodies and into the `d` field
//! of gateway dispatches, so both surfaces agree on every shape.
//! Snowflake IDs are serialized as strings for JavaScript compatibility.

use chrono::{DateTime, Utc};
use huddle_core::{NotificationKind, PresenceStatus, Snowflake};
use serde::Serialize;

/// A history page; `has_more` tells the client another page exists
#[derive(Debug, Serialize)]
pub struct MessagePage {
    pub messages: Vec<MessageResponse>,
    pub has_more: bool,
}

// ============================================================================
// Auth Responses
// ============================================================================

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: CurrentUserResponse,
}

// ============================================================================
// User Responses
// ============================================================================

/// Public profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserResponse {
    pub id: Snowflake,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

/// Own profile, including email
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUserResponse {
    pub id: Snowflake,
    pub username: String,
    pub display_name: Option<String>,
    pub email: String,
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceResponse {
    pub user_id: Snowflake,
    pub status: PresenceStatus,
    pub custom_status: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

/// Directory entry: profile plus live presence
#[derive(Debug, Clone, Serialize)]
pub struct UserWithPresenceResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub status: PresenceStatus,
    pub custom_status: Option<String>,
    pub last_seen: Option<DateTime<Utc>>,
}

// ============================================================================
// Conversation Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct ParticipantResponse {
    pub user: UserResponse,
    pub joined_at: DateTime<Utc>,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LastMessageResponse {
    pub message_id: Snowflake,
    pub sender_id: Snowflake,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub id: Snowflake,
    pub name: Option<String>,
    pub is_group: bool,
    pub admin_id: Option<Snowflake>,
    pub description: Option<String>,
    pub participants: Vec<ParticipantResponse>,
    pub last_message: Option<LastMessageResponse>,
    /// The caller's unread counter
    pub unread_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Result of `POST /conversations`; `created` is false when an existing
/// 1:1 was returned
#[derive(Debug, Clone, Serialize)]
pub struct CreatedConversation {
    #[serde(flatten)]
    pub conversation: ConversationResponse,
    pub created: bool,
}

/// `member_added` payload
#[derive(Debug, Clone, Serialize)]
pub struct MemberAddedPayload {
    pub conversation_id: Snowflake,
    pub user: UserResponse,
    pub added_by: Option<Snowflake>,
}

/// `member_removed` payload; `removed_by` equals `user_id` when they left
#[derive(Debug, Clone, Serialize)]
pub struct MemberRemovedPayload {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub removed_by: Option<Snowflake>,
    /// Admin after the change, when it moved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_admin_id: Option<Snowflake>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationDeletedPayload {
    pub conversation_id: Snowflake,
}

// ============================================================================
// Message Responses
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionResponse {
    pub emoji: String,
    pub user_id: Snowflake,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    pub sender: Option<UserResponse>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pinned_by: Option<Snowflake>,
    pub reactions: Vec<ReactionResponse>,
}

/// `message_sent` ack to the sending session
#[derive(Debug, Clone, Serialize)]
pub struct MessageSentPayload {
    pub nonce: Option<String>,
    pub message: MessageResponse,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageDeletedPayload {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReactionUpdatedPayload {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub reactions: Vec<ReactionResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagePinnedPayload {
    pub message_id: Snowflake,
    pub conversation_id: Snowflake,
    pub pinned: bool,
    pub pinned_by: Option<Snowflake>,
    pub pinned_at: Option<DateTime<Utc>>,
}

/// `user_typing` payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypingPayload {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub is_typing: bool,
}

// ============================================================================
// Notification Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: Snowflake,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Snowflake>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NotificationListResponse {
    pub notifications: Vec<NotificationResponse>,
    pub unread_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

// ============================================================================
// Health Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub database: String,
    pub redis: String,
}

impl ReadinessResponse {
    pub fn ready(database_healthy: bool, redis_healthy: bool) -> Self {
        let label = |ok: bool| if ok { "healthy" } else { "unhealthy" }.to_string();
        Self {
            status: if database_healthy && redis_healthy {
                "ready"
            } else {
                "not_ready"
            }
            .to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                database: label(database_healthy),
                redis: label(redis_healthy),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_serialize_as_strings() {
        let reaction = ReactionResponse {
            emoji: "👍".to_string(),
            user_id: Snowflake::new(99),
        };
        let json = serde_json::to_value(&reaction).unwrap();
        assert_eq!(json["user_id"], "99");
    }

    #[test]
    fn test_user_with_presence_is_flat() {
        let entry = UserWithPresenceResponse {
            user: UserResponse {
                id: Snowflake::new(1),
                username: "bilal".to_string(),
                display_name: None,
                avatar: None,
            },
            status: PresenceStatus::Online,
            custom_status: None,
            last_seen: None,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["username"], "bilal");
        assert_eq!(json["status"], "online");
        assert!(json.get("display_name").is_none());
    }

    #[test]
    fn test_readiness_response() {
        let ready = ReadinessResponse::ready(true, true);
        assert!(ready.is_ready());
        assert_eq!(ready.checks.database, "healthy");

        let not_ready = ReadinessResponse::ready(true, false);
        assert_eq!(not_ready.status, "not_ready");
        assert_eq!(not_ready.checks.redis, "unhealthy");
    }
}
