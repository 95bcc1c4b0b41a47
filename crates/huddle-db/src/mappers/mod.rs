//! Row <-> entity conversions
//!
//! - `From<Model> for Entity` (or `TryFrom` where a column needs parsing)
//! - `*Insert` structs borrow an entity and expose bind-ready values

mod conversation;
mod message;
mod notification;
mod user;

pub use conversation::{ConversationInsert, LastMessageColumns};
pub use message::MessageInsert;
pub use notification::NotificationInsert;
