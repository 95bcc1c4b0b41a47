//! PostgreSQL implementation of NotificationRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use huddle_core::entities::Notification;
use huddle_core::error::DomainError;
use huddle_core::traits::{NotificationRepository, RepoResult};
use huddle_core::value_objects::Snowflake;

use crate::mappers::NotificationInsert;
use crate::models::NotificationModel;

use super::error::map_db_error;

#[derive(Clone)]
pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Notification>> {
        let result = sqlx::query_as::<_, NotificationModel>(
            r"
            SELECT id, recipient_id, kind, title, body, conversation_id, is_read, created_at
            FROM notifications
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Notification::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_recipient(
        &self,
        recipient_id: Snowflake,
        unread_only: bool,
        limit: i64,
    ) -> RepoResult<Vec<Notification>> {
        let results = sqlx::query_as::<_, NotificationModel>(
            r"
            SELECT id, recipient_id, kind, title, body, conversation_id, is_read, created_at
            FROM notifications
            WHERE recipient_id = $1 AND (NOT $2 OR NOT is_read)
            ORDER BY id DESC
            LIMIT $3
            ",
        )
        .bind(recipient_id.into_inner())
        .bind(unread_only)
        .bind(limit.clamp(1, 100))
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        results.into_iter().map(Notification::try_from).collect()
    }

    #[instrument(skip(self, notification), fields(kind = notification.kind.as_str()))]
    async fn create(&self, notification: &Notification) -> RepoResult<()> {
        let row = NotificationInsert::new(notification);
        sqlx::query(
            r"
            INSERT INTO notifications (id, recipient_id, kind, title, body, conversation_id, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, FALSE, $7)
            ",
        )
        .bind(row.id)
        .bind(row.recipient_id)
        .bind(row.kind)
        .bind(row.title)
        .bind(row.body)
        .bind(row.conversation_id)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_read(&self, id: Snowflake) -> RepoResult<()> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotificationNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_all_read(&self, recipient_id: Snowflake) -> RepoResult<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(recipient_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Snowflake) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotificationNotFound(id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_unread(&self, recipient_id: Snowflake) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND NOT is_read",
        )
        .bind(recipient_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
