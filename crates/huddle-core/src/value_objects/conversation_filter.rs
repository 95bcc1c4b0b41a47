//! Conversation list filter

use serde::{Deserialize, Serialize};

/// Which conversations a list request keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationFilter {
    #[default]
    All,
    Groups,
    Unread,
}

impl ConversationFilter {
    /// Decide whether a conversation passes the filter
    pub fn accepts(self, is_group: bool, unread_count: i32) -> bool {
        match self {
            Self::All => true,
            Self::Groups => is_group,
            Self::Unread => unread_count > 0,
        }
    }
}

impl std::str::FromStr for ConversationFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "groups" | "group" => Ok(Self::Groups),
            "unread" => Ok(Self::Unread),
            other => Err(format!("unknown conversation filter: {other}")),
        }
    }
}

/// Case-insensitive substring match used for conversation search.
/// An empty or whitespace-only needle matches everything.
pub fn matches_search(haystack: &str, needle: &str) -> bool {
    let needle = needle.trim();
    needle.is_empty() || haystack.to_lowercase().contains(&needle.to_lowercase())
}
