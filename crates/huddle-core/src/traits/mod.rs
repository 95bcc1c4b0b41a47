//! Ports implemented by the infrastructure crates

mod repositories;

pub use repositories::{
    ConversationRepository, MessageQuery, MessageRepository, NotificationRepository,
    ParticipantRepository, ReactionRepository, RepoResult, UserRepository,
};
