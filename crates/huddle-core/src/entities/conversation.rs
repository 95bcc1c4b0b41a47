//! Conversation entity - a 1:1 or group thread and its participants

use chrono::{DateTime, Utc};

use crate::entities::Message;
use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Longest preview kept in the last-message snapshot
pub const LAST_MESSAGE_PREVIEW_LEN: usize = 120;

/// Maximum group name length in characters
pub const MAX_GROUP_NAME_LEN: usize = 100;

/// Denormalized copy of the newest message, used to order and render lists
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastMessage {
    pub message_id: Snowflake,
    pub sender_id: Snowflake,
    pub preview: String,
    pub created_at: DateTime<Utc>,
}

impl LastMessage {
    pub fn from_message(message: &Message) -> Self {
        Self {
            message_id: message.id,
            sender_id: message.sender_id,
            preview: message.preview(LAST_MESSAGE_PREVIEW_LEN).to_string(),
            created_at: message.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: Snowflake,
    /// Always `None` for direct conversations
    pub name: Option<String>,
    pub is_group: bool,
    /// Group admin; direct conversations have no admin
    pub admin_id: Option<Snowflake>,
    pub description: Option<String>,
    pub last_message: Option<LastMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new_direct(id: Snowflake) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: None,
            is_group: false,
            admin_id: None,
            description: None,
            last_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_group(
        id: Snowflake,
        name: &str,
        admin_id: Snowflake,
        description: Option<String>,
    ) -> Result<Self, DomainError> {
        let name = validate_group_name(name)?;
        let now = Utc::now();
        Ok(Self {
            id,
            name: Some(name),
            is_group: true,
            admin_id: Some(admin_id),
            description: description.filter(|d| !d.trim().is_empty()),
            last_message: None,
            created_at: now,
            updated_at: now,
        })
    }

    #[inline]
    pub fn is_admin(&self, user_id: Snowflake) -> bool {
        self.admin_id == Some(user_id)
    }

    /// Fails unless this is a group administered by `user_id`
    pub fn ensure_admin(&self, user_id: Snowflake) -> Result<(), DomainError> {
        if !self.is_group {
            return Err(DomainError::NotAGroup);
        }
        if !self.is_admin(user_id) {
            return Err(DomainError::NotGroupAdmin);
        }
        Ok(())
    }

    /// Groups are deleted by their admin; either side may delete a direct conversation
    pub fn can_delete(&self, user_id: Snowflake) -> bool {
        !self.is_group || self.is_admin(user_id)
    }

    pub fn rename(&mut self, name: &str) -> Result<(), DomainError> {
        if !self.is_group {
            return Err(DomainError::NotAGroup);
        }
        self.name = Some(validate_group_name(name)?);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description.filter(|d| !d.trim().is_empty());
        self.updated_at = Utc::now();
    }

    pub fn record_message(&mut self, message: &Message) {
        self.last_message = Some(LastMessage::from_message(message));
        self.updated_at = message.created_at;
    }

    /// Most recent activity, used to order conversation lists
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_message
            .as_ref()
            .map_or(self.updated_at, |m| m.created_at.max(self.updated_at))
    }

    /// Pick who inherits the admin role when `leaving` exits the group.
    /// The longest-standing remaining participant wins; ties go to the lower id.
    pub fn successor_admin(participants: &[Participant], leaving: Snowflake) -> Option<Snowflake> {
        participants
            .iter()
            .filter(|p| p.user_id != leaving)
            .min_by_key(|p| (p.joined_at, p.user_id))
            .map(|p| p.user_id)
    }
}

fn validate_group_name(name: &str) -> Result<String, DomainError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::ValidationError(
            "group name must not be empty".to_string(),
        ));
    }
    if name.chars().count() > MAX_GROUP_NAME_LEN {
        return Err(DomainError::ValidationError(format!(
            "group name must be at most {MAX_GROUP_NAME_LEN} characters"
        )));
    }
    Ok(name.to_string())
}

/// A user's membership in a conversation, including their unread counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub conversation_id: Snowflake,
    pub user_id: Snowflake,
    pub joined_at: DateTime<Utc>,
    pub unread_count: i32,
    pub last_read_message_id: Option<Snowflake>,
}

impl Participant {
    pub fn new(conversation_id: Snowflake, user_id: Snowflake) -> Self {
        Self {
            conversation_id,
            user_id,
            joined_at: Utc::now(),
            unread_count: 0,
            last_read_message_id: None,
        }
    }

    #[inline]
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }
}
