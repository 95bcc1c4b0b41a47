//! Reaction entity - an emoji a user attached to a message

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Upper bound on the emoji string (covers ZWJ sequences and `:shortcodes:`)
pub const MAX_EMOJI_LEN: usize = 64;

/// At most one row exists per `(message_id, user_id, emoji)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    pub message_id: Snowflake,
    pub user_id: Snowflake,
    pub emoji: String,
    pub created_at: DateTime<Utc>,
}

impl Reaction {
    pub fn new(message_id: Snowflake, user_id: Snowflake, emoji: String) -> Self {
        Self {
            message_id,
            user_id,
            emoji,
            created_at: Utc::now(),
        }
    }
}

pub fn validate_emoji(emoji: &str) -> Result<String, DomainError> {
    let emoji = emoji.trim();
    if emoji.is_empty() || emoji.len() > MAX_EMOJI_LEN || emoji.chars().any(char::is_whitespace) {
        return Err(DomainError::InvalidEmoji);
    }
    Ok(emoji.to_string())
}

/// Reactions on one message grouped by emoji
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionGroup {
    pub emoji: String,
    pub user_ids: Vec<Snowflake>,
}

impl ReactionGroup {
    #[inline]
    pub fn count(&self) -> usize {
        self.user_ids.len()
    }
}

/// Group reactions by emoji, keeping first-seen order and dropping
/// repeated `(user, emoji)` pairs
pub fn group_reactions<'a, I>(reactions: I) -> Vec<ReactionGroup>
where
    I: IntoIterator<Item = &'a Reaction>,
{
    let mut groups: Vec<ReactionGroup> = Vec::new();
    for reaction in reactions {
        match groups.iter_mut().find(|g| g.emoji == reaction.emoji) {
            Some(group) => {
                if !group.user_ids.contains(&reaction.user_id) {
                    group.user_ids.push(reaction.user_id);
                }
            }
            None => groups.push(ReactionGroup {
                emoji: reaction.emoji.clone(),
                user_ids: vec![reaction.user_id],
            }),
        }
    }
    groups
}
