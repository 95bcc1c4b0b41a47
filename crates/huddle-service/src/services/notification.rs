//! Notification service
//!
//! Notifications are only ever created here. Each one is stored and then
//! pushed as `new_notification` to the recipient's user channel.

use huddle_cache::event_names;
use huddle_core::{DomainError, Notification, NotificationKind, Snowflake};
use tracing::{info, instrument};

use crate::dto::{MarkAllReadResponse, NotificationListResponse, NotificationQuery, NotificationResponse};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::events::{event, Audience};

const DEFAULT_LIST_LIMIT: i64 = 50;
const MAX_LIST_LIMIT: i64 = 100;

pub struct NotificationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> NotificationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        user_id: Snowflake,
        query: NotificationQuery,
    ) -> ServiceResult<NotificationListResponse> {
        let limit = query.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let notifications = self
            .ctx
            .notification_repo()
            .find_by_recipient(user_id, query.unread_only, limit)
            .await?;
        let unread_count = self.ctx.notification_repo().count_unread(user_id).await?;

        Ok(NotificationListResponse {
            notifications: notifications.iter().map(NotificationResponse::from).collect(),
            unread_count,
        })
    }

    #[instrument(skip(self))]
    pub async fn mark_read(
        &self,
        user_id: Snowflake,
        notification_id: Snowflake,
    ) -> ServiceResult<NotificationResponse> {
        let mut notification = self.owned(user_id, notification_id).await?;
        if !notification.is_read {
            self.ctx.notification_repo().mark_read(notification_id).await?;
            notification.mark_read();
        }
        Ok(NotificationResponse::from(&notification))
    }

    #[instrument(skip(self))]
    pub async fn mark_all_read(&self, user_id: Snowflake) -> ServiceResult<MarkAllReadResponse> {
        let updated = self.ctx.notification_repo().mark_all_read(user_id).await?;
        info!(user_id = %user_id, updated = updated, "Notifications marked read");
        Ok(MarkAllReadResponse { updated })
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Snowflake, notification_id: Snowflake) -> ServiceResult<()> {
        self.owned(user_id, notification_id).await?;
        self.ctx.notification_repo().delete(notification_id).await?;
        info!(notification_id = %notification_id, "Notification deleted");
        Ok(())
    }

    /// Store a notification and push it to the recipient
    #[instrument(skip(self, title, body))]
    pub async fn notify(
        &self,
        recipient_id: Snowflake,
        kind: NotificationKind,
        title: impl Into<String>,
        body: impl Into<String>,
        conversation_id: Option<Snowflake>,
    ) -> ServiceResult<NotificationResponse> {
        let mut notification = Notification::new(self.ctx.generate_id(), recipient_id, kind, title, body);
        if let Some(conversation_id) = conversation_id {
            notification = notification.for_conversation(conversation_id);
        }
        self.ctx.notification_repo().create(&notification).await?;

        info!(
            notification_id = %notification.id,
            recipient_id = %recipient_id,
            kind = kind.as_str(),
            "Notification created"
        );

        let response = NotificationResponse::from(&notification);
        self.ctx
            .emit(
                Audience::users([recipient_id]),
                event(event_names::NEW_NOTIFICATION, &response),
            )
            .await;
        Ok(response)
    }

    /// Other users' notifications look like missing ones
    async fn owned(&self, user_id: Snowflake, notification_id: Snowflake) -> ServiceResult<Notification> {
        self.ctx
            .notification_repo()
            .find_by_id(notification_id)
            .await?
            .filter(|n| n.recipient_id == user_id)
            .ok_or_else(|| DomainError::NotificationNotFound(notification_id).into())
    }
}
