//! Repository traits (ports) for data access
//!
//! The domain layer defines what it needs; `huddle-db` provides the
//! PostgreSQL implementations and service tests provide in-memory ones.

use async_trait::async_trait;

use crate::entities::{
    Conversation, LastMessage, Message, Notification, Participant, Reaction, User,
};
use crate::error::DomainError;
use crate::value_objects::Snowflake;

pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>>;

    /// Users for the given ids; unknown ids are skipped
    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Case-insensitive lookup of several usernames (used to resolve mentions)
    async fn find_by_usernames(&self, usernames: &[String]) -> RepoResult<Vec<User>>;

    /// Directory listing, optionally filtered by a username/display-name substring
    async fn search(&self, query: Option<&str>, limit: i64) -> RepoResult<Vec<User>>;

    async fn email_exists(&self, email: &str) -> RepoResult<bool>;

    async fn username_exists(&self, username: &str) -> RepoResult<bool>;

    async fn create(&self, user: &User, password_hash: &str) -> RepoResult<()>;

    async fn update(&self, user: &User) -> RepoResult<()>;

    async fn get_password_hash(&self, id: Snowflake) -> RepoResult<Option<String>>;
}

// ============================================================================
// Conversation Repository
// ============================================================================

#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>>;

    /// Every conversation the user takes part in, paired with their own
    /// participant row, newest activity first
    async fn find_by_user(&self, user_id: Snowflake)
        -> RepoResult<Vec<(Conversation, Participant)>>;

    /// The direct conversation between two users, if any
    async fn find_direct(
        &self,
        user_a: Snowflake,
        user_b: Snowflake,
    ) -> RepoResult<Option<Conversation>>;

    /// Insert the conversation together with its initial participants
    async fn create(
        &self,
        conversation: &Conversation,
        participants: &[Participant],
    ) -> RepoResult<()>;

    /// Persist name, description and admin
    async fn update(&self, conversation: &Conversation) -> RepoResult<()>;

    /// Remove `user_id` and store the conversation's `admin_id` in one
    /// transaction; false when the user was not a participant
    async fn remove_member(&self, conversation: &Conversation, user_id: Snowflake)
        -> RepoResult<bool>;

    async fn update_last_message(
        &self,
        conversation_id: Snowflake,
        last_message: &LastMessage,
    ) -> RepoResult<()>;

    /// Hard delete; participants, messages and reactions cascade
    async fn delete(&self, id: Snowflake) -> RepoResult<()>;
}

// ============================================================================
// Participant Repository
// ============================================================================

#[async_trait]
pub trait ParticipantRepository: Send + Sync {
    async fn find(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<Participant>>;

    /// Participants ordered by join time
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
    ) -> RepoResult<Vec<Participant>>;

    async fn is_participant(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<bool>;

    async fn add(&self, participant: &Participant) -> RepoResult<()>;

    /// Returns whether a row was removed
    async fn remove(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool>;

    /// Bump the unread counter of everyone except the sender
    async fn increment_unread(
        &self,
        conversation_id: Snowflake,
        sender_id: Snowflake,
    ) -> RepoResult<()>;

    /// Reset the unread counter for one participant
    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        last_read_message_id: Option<Snowflake>,
    ) -> RepoResult<()>;

    async fn count(&self, conversation_id: Snowflake) -> RepoResult<i64>;
}

// ============================================================================
// Message Repository
// ============================================================================

/// Cursor pagination for message history
#[derive(Debug, Clone, Default)]
pub struct MessageQuery {
    pub before: Option<Snowflake>,
    pub after: Option<Snowflake>,
    pub limit: i64,
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Soft-deleted messages are not returned
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>>;

    async fn find_by_nonce(&self, sender_id: Snowflake, nonce: &str)
        -> RepoResult<Option<Message>>;

    /// History page in ascending id order
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>>;

    async fn find_pinned(&self, conversation_id: Snowflake) -> RepoResult<Vec<Message>>;

    /// Fails with [`DomainError::DuplicateNonce`] when `(sender_id, nonce)` exists
    async fn create(&self, message: &Message) -> RepoResult<()>;

    /// Overwrite content and edit markers (last write wins)
    async fn update_content(&self, message: &Message) -> RepoResult<()>;

    async fn set_pinned(&self, message: &Message) -> RepoResult<()>;

    async fn soft_delete(&self, id: Snowflake) -> RepoResult<()>;
}

// ============================================================================
// Reaction Repository
// ============================================================================

#[async_trait]
pub trait ReactionRepository: Send + Sync {
    /// Reactions on one message, oldest first
    async fn find_by_message(&self, message_id: Snowflake) -> RepoResult<Vec<Reaction>>;

    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>>;

    /// Insert unless the same user already used the same emoji.
    /// Returns whether a row was inserted.
    async fn create(&self, reaction: &Reaction) -> RepoResult<bool>;

    /// Returns whether a row was removed
    async fn delete(&self, message_id: Snowflake, user_id: Snowflake, emoji: &str)
        -> RepoResult<bool>;

    async fn delete_all(&self, message_id: Snowflake) -> RepoResult<()>;
}

// ============================================================================
// Notification Repository
// ============================================================================

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Notification>>;

    /// Newest first
    async fn find_by_recipient(
        &self,
        recipient_id: Snowflake,
        unread_only: bool,
        limit: i64,
    ) -> RepoResult<Vec<Notification>>;

    async fn create(&self, notification: &Notification) -> RepoResult<()>;

    async fn mark_read(&self, id: Snowflake) -> RepoResult<()>;

    /// Returns the number of notifications flipped to read
    async fn mark_all_read(&self, recipient_id: Snowflake) -> RepoResult<u64>;

    async fn delete(&self, id: Snowflake) -> RepoResult<()>;

    async fn count_unread(&self, recipient_id: Snowflake) -> RepoResult<i64>;
}
