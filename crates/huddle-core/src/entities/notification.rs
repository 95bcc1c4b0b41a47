//! Notification entity - a server-generated alert for one user

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::Snowflake;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Mention,
    AddedToGroup,
    RemovedFromGroup,
}

impl NotificationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mention => "mention",
            Self::AddedToGroup => "added_to_group",
            Self::RemovedFromGroup => "removed_from_group",
        }
    }
}

impl std::str::FromStr for NotificationKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mention" => Ok(Self::Mention),
            "added_to_group" => Ok(Self::AddedToGroup),
            "removed_from_group" => Ok(Self::RemovedFromGroup),
            other => Err(format!("unknown notification kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Snowflake,
    pub recipient_id: Snowflake,
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
    pub conversation_id: Option<Snowflake>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        id: Snowflake,
        recipient_id: Snowflake,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id,
            recipient_id,
            kind,
            title: title.into(),
            body: body.into(),
            conversation_id: None,
            is_read: false,
            created_at: Utc::now(),
        }
    }

    pub fn for_conversation(mut self, conversation_id: Snowflake) -> Self {
        self.conversation_id = Some(conversation_id);
        self
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}
