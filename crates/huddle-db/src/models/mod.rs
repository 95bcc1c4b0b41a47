//! Row types for SQLx `FromRow`

mod conversation;
mod message;
mod notification;
mod user;

pub use conversation::{ConversationModel, ConversationWithParticipantModel, ParticipantModel};
pub use message::{MessageModel, ReactionModel};
pub use notification::NotificationModel;
pub use user::UserModel;
