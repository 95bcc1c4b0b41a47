//! Pub/Sub channel naming

use huddle_core::Snowflake;

pub const CONVERSATION_CHANNEL_PREFIX: &str = "conversation:";
pub const USER_CHANNEL_PREFIX: &str = "user:";
/// Every connected session, e.g. presence changes
pub const BROADCAST_CHANNEL: &str = "broadcast";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PubSubChannel {
    /// Sessions that joined the conversation room
    Conversation(Snowflake),
    /// All sessions of one user
    User(Snowflake),
    Broadcast,
}

impl PubSubChannel {
    #[must_use]
    pub fn conversation(conversation_id: Snowflake) -> Self {
        Self::Conversation(conversation_id)
    }

    #[must_use]
    pub fn user(user_id: Snowflake) -> Self {
        Self::User(user_id)
    }

    #[must_use]
    pub fn broadcast() -> Self {
        Self::Broadcast
    }

    /// Redis channel name
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Conversation(id) => format!("{CONVERSATION_CHANNEL_PREFIX}{id}"),
            Self::User(id) => format!("{USER_CHANNEL_PREFIX}{id}"),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
        }
    }

    /// Glob pattern matching every channel of this channel's kind
    #[must_use]
    pub fn pattern(&self) -> String {
        match self {
            Self::Conversation(_) => format!("{CONVERSATION_CHANNEL_PREFIX}*"),
            Self::User(_) => format!("{USER_CHANNEL_PREFIX}*"),
            Self::Broadcast => BROADCAST_CHANNEL.to_string(),
        }
    }

    /// Channels this crate does not name are rejected
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        if name == BROADCAST_CHANNEL {
            return Some(Self::Broadcast);
        }
        if let Some(id) = name.strip_prefix(CONVERSATION_CHANNEL_PREFIX) {
            return Snowflake::parse(id).ok().map(Self::Conversation);
        }
        if let Some(id) = name.strip_prefix(USER_CHANNEL_PREFIX) {
            return Snowflake::parse(id).ok().map(Self::User);
        }
        None
    }
}

impl std::fmt::Display for PubSubChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}
