//! Message entity - one post in a conversation

use chrono::{DateTime, Utc};

use crate::error::DomainError;
use crate::value_objects::Snowflake;

/// Default maximum message length in characters
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 4000;

/// Maximum client nonce length
pub const MAX_NONCE_LEN: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Snowflake,
    pub conversation_id: Snowflake,
    pub sender_id: Snowflake,
    pub content: String,
    /// Client-generated correlation id; `(sender_id, nonce)` is unique
    pub nonce: Option<String>,
    pub created_at: DateTime<Utc>,
    pub edited: bool,
    pub edited_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub pinned_at: Option<DateTime<Utc>>,
    pub pinned_by: Option<Snowflake>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn new(
        id: Snowflake,
        conversation_id: Snowflake,
        sender_id: Snowflake,
        content: String,
    ) -> Self {
        Self {
            id,
            conversation_id,
            sender_id,
            content,
            nonce: None,
            created_at: Utc::now(),
            edited: false,
            edited_at: None,
            pinned: false,
            pinned_at: None,
            pinned_by: None,
            deleted_at: None,
        }
    }

    pub fn with_nonce(mut self, nonce: Option<String>) -> Self {
        self.nonce = nonce;
        self
    }

    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Replace the content. Later edits always win.
    pub fn edit(&mut self, content: String) {
        self.content = content;
        self.edited = true;
        self.edited_at = Some(Utc::now());
    }

    pub fn pin(&mut self, by: Snowflake) {
        self.pinned = true;
        self.pinned_at = Some(Utc::now());
        self.pinned_by = Some(by);
    }

    pub fn unpin(&mut self) {
        self.pinned = false;
        self.pinned_at = None;
        self.pinned_by = None;
    }

    /// Soft delete: content is dropped, the row stays for ordering
    pub fn soft_delete(&mut self) {
        self.content.clear();
        self.pinned = false;
        self.pinned_at = None;
        self.pinned_by = None;
        self.deleted_at = Some(Utc::now());
    }

    /// Prefix of the content cut at a char boundary
    pub fn preview(&self, max_len: usize) -> &str {
        match self.content.char_indices().nth(max_len) {
            Some((end, _)) => &self.content[..end],
            None => &self.content,
        }
    }

    /// Lower-cased usernames mentioned as `@name`, deduplicated, in order of appearance
    pub fn mentions(&self) -> Vec<String> {
        extract_mentions(&self.content)
    }
}

/// Trim and bound-check message content
pub fn validate_content(content: &str, max_len: usize) -> Result<String, DomainError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(DomainError::EmptyContent);
    }
    if trimmed.chars().count() > max_len {
        return Err(DomainError::ContentTooLong { max: max_len });
    }
    Ok(trimmed.to_string())
}

/// Reject nonces that are empty or oversized
pub fn validate_nonce(nonce: Option<String>) -> Result<Option<String>, DomainError> {
    match nonce {
        Some(n) if n.is_empty() || n.len() > MAX_NONCE_LEN => Err(DomainError::ValidationError(
            format!("nonce must be 1..={MAX_NONCE_LEN} bytes"),
        )),
        other => Ok(other),
    }
}

pub fn extract_mentions(content: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    let mut chars = content.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        if ch != '@' {
            continue;
        }
        // "a@b" is an address, not a mention
        let preceded_by_word = content[..idx]
            .chars()
            .next_back()
            .is_some_and(|c| c.is_alphanumeric() || c == '_');
        if preceded_by_word {
            continue;
        }

        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
            if c.is_alphanumeric() || c == '_' || c == '.' || c == '-' {
                name.push(c.to_ascii_lowercase());
                chars.next();
            } else {
                break;
            }
        }
        let name = name.trim_end_matches(['.', '-']).to_string();
        if !name.is_empty() && !found.contains(&name) {
            found.push(name);
        }
    }

    found
}
