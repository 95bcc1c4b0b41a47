use huddle_core::entities::{Notification, NotificationKind};
use huddle_core::error::DomainError;
use huddle_core::value_objects::Snowflake;

use crate::models::NotificationModel;

impl TryFrom<NotificationModel> for Notification {
    type Error = DomainError;

    fn try_from(model: NotificationModel) -> Result<Self, Self::Error> {
        let kind: NotificationKind = model
            .kind
            .parse()
            .map_err(DomainError::DatabaseError)?;

        Ok(Notification {
            id: Snowflake::new(model.id),
            recipient_id: Snowflake::new(model.recipient_id),
            kind,
            title: model.title,
            body: model.body,
            conversation_id: model.conversation_id.map(Snowflake::new),
            is_read: model.is_read,
            created_at: model.created_at,
        })
    }
}

pub struct NotificationInsert<'a> {
    pub id: i64,
    pub recipient_id: i64,
    pub kind: &'static str,
    pub title: &'a str,
    pub body: &'a str,
    pub conversation_id: Option<i64>,
}

impl<'a> NotificationInsert<'a> {
    pub fn new(notification: &'a Notification) -> Self {
        Self {
            id: notification.id.into_inner(),
            recipient_id: notification.recipient_id.into_inner(),
            kind: notification.kind.as_str(),
            title: &notification.title,
            body: &notification.body,
            conversation_id: notification.conversation_id.map(Snowflake::into_inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_unknown_kind_is_rejected() {
        let model = NotificationModel {
            id: 1,
            recipient_id: 2,
            kind: "party".into(),
            title: "t".into(),
            body: "b".into(),
            conversation_id: None,
            is_read: false,
            created_at: Utc::now(),
        };
        assert!(Notification::try_from(model).is_err());
    }
}
