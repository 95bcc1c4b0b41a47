//! # huddle-core
//!
//! Domain layer: conversations, messages, reactions, notifications and
//! presence, plus the repository traits the infrastructure implements.
//! Nothing in this crate touches the network or a database.

pub mod entities;
pub mod error;
pub mod traits;
pub mod value_objects;

pub use entities::{
    Conversation, LastMessage, Message, Notification, NotificationKind, Participant, Reaction,
    ReactionGroup, User,
};
pub use error::DomainError;
pub use traits::{
    ConversationRepository, MessageQuery, MessageRepository, NotificationRepository,
    ParticipantRepository, ReactionRepository, RepoResult, UserRepository,
};
pub use value_objects::{
    ConversationFilter, PresenceStatus, Snowflake, SnowflakeGenerator, SnowflakeParseError,
};
