//! Request DTOs for API endpoints and gateway events
//!
//! All request DTOs implement `Deserialize`; the ones with field rules
//! also implement `Validate`. Message content is checked by the service
//! because its limit comes from configuration.

use huddle_core::{ConversationFilter, PresenceStatus, Snowflake};
use serde::Deserialize;
use validator::{Validate, ValidationError};

// ============================================================================
// Auth Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(
        length(min = 3, max = 32, message = "Username must be 3-32 characters"),
        custom(function = "validate_username")
    )]
    pub username: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, max = 72, message = "Password must be 8-72 characters"))]
    pub password: String,

    #[validate(length(max = 64, message = "Display name must be at most 64 characters"))]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}

/// Logout one device by its refresh token, or every device without one
#[derive(Debug, Clone, Deserialize, Default)]
pub struct LogoutRequest {
    pub refresh_token: Option<String>,
}

/// Usernames double as mention handles, so they stick to `[A-Za-z0-9_.-]`
fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        let mut err = ValidationError::new("username_charset");
        err.message = Some("Username may only contain letters, digits, '_', '.' and '-'".into());
        Err(err)
    }
}

// ============================================================================
// User Requests
// ============================================================================

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateUserRequest {
    /// Empty string clears the display name
    #[validate(length(max = 64, message = "Display name must be at most 64 characters"))]
    pub display_name: Option<String>,

    /// Empty string removes the avatar
    #[validate(length(max = 512, message = "Avatar must be at most 512 characters"))]
    pub avatar: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    pub status: PresenceStatus,

    #[validate(length(max = 128, message = "Custom status must be at most 128 characters"))]
    pub custom_status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserSearchQuery {
    pub search: Option<String>,
    pub limit: Option<i64>,
}

// ============================================================================
// Conversation Requests
// ============================================================================

/// `{participant_id}` opens a 1:1; `{name, participant_ids}` creates a group
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct CreateConversationRequest {
    pub participant_id: Option<Snowflake>,

    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: Option<String>,

    #[serde(default)]
    pub participant_ids: Vec<Snowflake>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

/// What a [`CreateConversationRequest`] asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NewConversation {
    Direct {
        participant_id: Snowflake,
    },
    Group {
        name: String,
        participant_ids: Vec<Snowflake>,
        description: Option<String>,
    },
}

impl CreateConversationRequest {
    /// A name makes it a group; `participant_id` alone makes it direct
    pub fn into_kind(self) -> Option<NewConversation> {
        match (self.name, self.participant_id) {
            (Some(name), single) => {
                let mut participant_ids = self.participant_ids;
                participant_ids.extend(single);
                Some(NewConversation::Group {
                    name,
                    participant_ids,
                    description: self.description,
                })
            }
            (None, Some(participant_id)) => Some(NewConversation::Direct { participant_id }),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateConversationRequest {
    #[validate(length(min = 1, max = 100, message = "Group name must be 1-100 characters"))]
    pub name: Option<String>,

    /// Empty string clears the description
    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParticipantRequest {
    pub user_id: Snowflake,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub filter: ConversationFilter,
    pub search: Option<String>,
}

// ============================================================================
// Message Requests
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageHistoryQuery {
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
    pub nonce: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EditMessageRequest {
    pub content: String,
}

// ============================================================================
// Notification Requests
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub limit: Option<i64>,
}
