//! PostgreSQL implementations of the `huddle-core` repository traits

mod conversation;
mod error;
mod message;
mod notification;
mod participant;
mod reaction;
mod user;

pub use conversation::PgConversationRepository;
pub use message::PgMessageRepository;
pub use notification::PgNotificationRepository;
pub use participant::PgParticipantRepository;
pub use reaction::PgReactionRepository;
pub use user::PgUserRepository;
