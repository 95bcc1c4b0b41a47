//! PostgreSQL implementation of MessageRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use huddle_core::entities::Message;
use huddle_core::error::DomainError;
use huddle_core::traits::{MessageQuery, MessageRepository, RepoResult};
use huddle_core::value_objects::Snowflake;

use crate::mappers::MessageInsert;
use crate::models::MessageModel;

use super::error::{map_db_error, map_unique_violation};

const MESSAGE_COLUMNS: &str = "id, conversation_id, sender_id, content, nonce, created_at, \
                               edited_at, pinned_at, pinned_by, deleted_at";

#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
}

impl PgMessageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageRepository for PgMessageRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let result = sqlx::query_as::<_, MessageModel>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Message::from))
    }

    #[instrument(skip(self))]
    async fn find_by_nonce(
        &self,
        sender_id: Snowflake,
        nonce: &str,
    ) -> RepoResult<Option<Message>> {
        let result = sqlx::query_as::<_, MessageModel>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE sender_id = $1 AND nonce = $2"
        ))
        .bind(sender_id.into_inner())
        .bind(nonce)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Message::from))
    }

    #[instrument(skip(self))]
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
        query: MessageQuery,
    ) -> RepoResult<Vec<Message>> {
        let limit = query.limit.clamp(1, 100);

        let mut results = match (query.before, query.after) {
            (Some(before), _) => {
                // Scrolling up: newest page below the cursor
                sqlx::query_as::<_, MessageModel>(&format!(
                    r"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE conversation_id = $1 AND id < $2 AND deleted_at IS NULL
                    ORDER BY id DESC
                    LIMIT $3
                    "
                ))
                .bind(conversation_id.into_inner())
                .bind(before.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, Some(after)) => {
                sqlx::query_as::<_, MessageModel>(&format!(
                    r"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE conversation_id = $1 AND id > $2 AND deleted_at IS NULL
                    ORDER BY id ASC
                    LIMIT $3
                    "
                ))
                .bind(conversation_id.into_inner())
                .bind(after.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
            (None, None) => {
                sqlx::query_as::<_, MessageModel>(&format!(
                    r"
                    SELECT {MESSAGE_COLUMNS} FROM messages
                    WHERE conversation_id = $1 AND deleted_at IS NULL
                    ORDER BY id DESC
                    LIMIT $2
                    "
                ))
                .bind(conversation_id.into_inner())
                .bind(limit)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_db_error)?;

        results.sort_by_key(|m| m.id);
        Ok(results.into_iter().map(Message::from).collect())
    }

    #[instrument(skip(self))]
    async fn find_pinned(&self, conversation_id: Snowflake) -> RepoResult<Vec<Message>> {
        let results = sqlx::query_as::<_, MessageModel>(&format!(
            r"
            SELECT {MESSAGE_COLUMNS} FROM messages
            WHERE conversation_id = $1 AND pinned_at IS NOT NULL AND deleted_at IS NULL
            ORDER BY pinned_at DESC
            "
        ))
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Message::from).collect())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn create(&self, message: &Message) -> RepoResult<()> {
        let row = MessageInsert::new(message);
        sqlx::query(
            r"
            INSERT INTO messages (id, conversation_id, sender_id, content, nonce, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(row.id)
        .bind(row.conversation_id)
        .bind(row.sender_id)
        .bind(row.content)
        .bind(row.nonce)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| DomainError::DuplicateNonce))?;

        Ok(())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id))]
    async fn update_content(&self, message: &Message) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET content = $2, edited_at = COALESCE($3, NOW())
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(message.id.into_inner())
        .bind(&message.content)
        .bind(message.edited_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MessageNotFound(message.id));
        }
        Ok(())
    }

    #[instrument(skip(self, message), fields(message_id = %message.id, pinned = message.pinned))]
    async fn set_pinned(&self, message: &Message) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET pinned_at = $2, pinned_by = $3
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(message.id.into_inner())
        .bind(message.pinned_at)
        .bind(message.pinned_by.map(Snowflake::into_inner))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MessageNotFound(message.id));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn soft_delete(&self, id: Snowflake) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE messages
            SET content = '', pinned_at = NULL, pinned_by = NULL, deleted_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            ",
        )
        .bind(id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::MessageNotFound(id));
        }
        Ok(())
    }
}
