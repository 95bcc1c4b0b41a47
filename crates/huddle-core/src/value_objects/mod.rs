//! Value objects - small immutable domain types

mod conversation_filter;
mod presence;
mod snowflake;

pub use conversation_filter::{matches_search, ConversationFilter};
pub use presence::{InvalidPresenceStatus, PresenceStatus};
pub use snowflake::{Snowflake, SnowflakeGenerator, SnowflakeParseError};
