//! Use-case services
//!
//! Each service borrows the shared [`ServiceContext`] and is cheap to
//! construct per request or per gateway event.

pub mod auth;
pub mod context;
pub mod conversation;
pub mod error;
pub mod events;
mod membership;
pub mod message;
pub mod notification;
pub mod presence;
pub mod reaction;
pub mod user;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::AuthService;
pub use context::{ServiceContext, ServiceContextBuilder};
pub use conversation::{ConversationService, MembershipChange};
pub use error::{ServiceError, ServiceResult};
pub use events::EventPublisher;
pub use message::{MessageService, SendOutcome};
pub use notification::NotificationService;
pub use presence::PresenceService;
pub use reaction::ReactionService;
pub use user::UserService;
