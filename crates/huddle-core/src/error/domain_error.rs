//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::Snowflake;

#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(Snowflake),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(Snowflake),

    #[error("Message not found: {0}")]
    MessageNotFound(Snowflake),

    #[error("Notification not found: {0}")]
    NotificationNotFound(Snowflake),

    #[error("User is not a participant of this conversation")]
    ParticipantNotFound,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid username: {0}")]
    InvalidUsername(String),

    #[error("Password too weak: {0}")]
    WeakPassword(String),

    #[error("Message content must not be empty")]
    EmptyContent,

    #[error("Content too long: max {max} characters")]
    ContentTooLong { max: usize },

    #[error("Invalid emoji")]
    InvalidEmoji,

    #[error("Operation requires a group conversation")]
    NotAGroup,

    #[error("A group needs at least one other participant")]
    GroupNeedsParticipants,

    #[error("Group is full: max {max} participants")]
    GroupTooLarge { max: usize },

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Not a participant of this conversation")]
    NotParticipant,

    #[error("Only the group admin can do this")]
    NotGroupAdmin,

    #[error("Not the message sender")]
    NotMessageSender,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Email already in use")]
    EmailAlreadyExists,

    #[error("Username already taken")]
    UsernameAlreadyExists,

    #[error("User is already a participant")]
    AlreadyParticipant,

    #[error("A message with this nonce already exists")]
    DuplicateNonce,

    // =========================================================================
    // Business Rule Violations
    // =========================================================================
    #[error("Group admin cannot remove themselves (leave the group instead)")]
    AdminCannotRemoveSelf,

    #[error("Cannot leave a direct conversation (delete it instead)")]
    CannotLeaveDirect,

    #[error("Cannot start a conversation with yourself")]
    CannotMessageSelf,

    #[error("Message has been deleted")]
    MessageDeleted,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Stable machine-readable code for API and gateway error payloads
    pub fn code(&self) -> &'static str {
        match self {
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ConversationNotFound(_) => "CONVERSATION_NOT_FOUND",
            Self::MessageNotFound(_) => "MESSAGE_NOT_FOUND",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::ParticipantNotFound => "PARTICIPANT_NOT_FOUND",

            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidUsername(_) => "INVALID_USERNAME",
            Self::WeakPassword(_) => "WEAK_PASSWORD",
            Self::EmptyContent => "EMPTY_CONTENT",
            Self::ContentTooLong { .. } => "MESSAGE_TOO_LONG",
            Self::InvalidEmoji => "INVALID_EMOJI",
            Self::NotAGroup => "NOT_A_GROUP",
            Self::GroupNeedsParticipants => "GROUP_NEEDS_PARTICIPANTS",
            Self::GroupTooLarge { .. } => "GROUP_TOO_LARGE",

            Self::NotParticipant => "NOT_PARTICIPANT",
            Self::NotGroupAdmin => "NOT_GROUP_ADMIN",
            Self::NotMessageSender => "NOT_MESSAGE_SENDER",

            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::UsernameAlreadyExists => "USERNAME_ALREADY_EXISTS",
            Self::AlreadyParticipant => "ALREADY_PARTICIPANT",
            Self::DuplicateNonce => "DUPLICATE_NONCE",

            Self::AdminCannotRemoveSelf => "ADMIN_CANNOT_REMOVE_SELF",
            Self::CannotLeaveDirect => "CANNOT_LEAVE_DIRECT",
            Self::CannotMessageSelf => "CANNOT_MESSAGE_SELF",
            Self::MessageDeleted => "MESSAGE_DELETED",

            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::CacheError(_) => "CACHE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::UserNotFound(_)
                | Self::ConversationNotFound(_)
                | Self::MessageNotFound(_)
                | Self::NotificationNotFound(_)
                | Self::ParticipantNotFound
                | Self::MessageDeleted
        )
    }

    /// Validation failures and broken business rules both map to 400
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ValidationError(_)
                | Self::InvalidEmail
                | Self::InvalidUsername(_)
                | Self::WeakPassword(_)
                | Self::EmptyContent
                | Self::ContentTooLong { .. }
                | Self::InvalidEmoji
                | Self::NotAGroup
                | Self::GroupNeedsParticipants
                | Self::GroupTooLarge { .. }
                | Self::AdminCannotRemoveSelf
                | Self::CannotLeaveDirect
                | Self::CannotMessageSelf
        )
    }

    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            Self::NotParticipant | Self::NotGroupAdmin | Self::NotMessageSender
        )
    }

    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::EmailAlreadyExists
                | Self::UsernameAlreadyExists
                | Self::AlreadyParticipant
                | Self::DuplicateNonce
        )
    }
}
