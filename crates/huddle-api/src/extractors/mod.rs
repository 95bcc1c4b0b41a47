//! Axum extractors for authentication, typed paths, query strings and
//! validated bodies

mod auth;
mod path;
mod query;
mod validated;

pub use auth::AuthUser;
pub use path::{ConversationPath, MessagePath, NotificationPath, ReactionPath};
pub use query::QueryParams;
pub use validated::{JsonBody, ValidatedJson};
