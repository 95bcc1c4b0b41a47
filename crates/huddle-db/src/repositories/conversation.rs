//! PostgreSQL implementation of ConversationRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use huddle_core::entities::{Conversation, LastMessage, Participant};
use huddle_core::error::DomainError;
use huddle_core::traits::{ConversationRepository, RepoResult};
use huddle_core::value_objects::Snowflake;

use crate::mappers::{ConversationInsert, LastMessageColumns};
use crate::models::{ConversationModel, ConversationWithParticipantModel};

use super::error::{map_db_error, map_foreign_key_violation};

#[derive(Clone)]
pub struct PgConversationRepository {
    pool: PgPool,
}

impl PgConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        let result = sqlx::query_as::<_, ConversationModel>(
            r"
            SELECT id, name, is_group, admin_id, description,
                   last_message_id, last_message_sender_id, last_message_preview, last_message_at,
                   created_at, updated_at
            FROM conversations
            WHERE id = $1
            ",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Conversation::from))
    }

    #[instrument(skip(self))]
    async fn find_by_user(
        &self,
        user_id: Snowflake,
    ) -> RepoResult<Vec<(Conversation, Participant)>> {
        let results = sqlx::query_as::<_, ConversationWithParticipantModel>(
            r"
            SELECT c.id, c.name, c.is_group, c.admin_id, c.description,
                   c.last_message_id, c.last_message_sender_id, c.last_message_preview,
                   c.last_message_at, c.created_at, c.updated_at,
                   p.user_id, p.joined_at, p.unread_count, p.last_read_message_id
            FROM conversations c
            JOIN conversation_participants p ON p.conversation_id = c.id
            WHERE p.user_id = $1
            ORDER BY GREATEST(c.updated_at, COALESCE(c.last_message_at, c.updated_at)) DESC, c.id DESC
            ",
        )
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_direct(
        &self,
        user_a: Snowflake,
        user_b: Snowflake,
    ) -> RepoResult<Option<Conversation>> {
        let result = sqlx::query_as::<_, ConversationModel>(
            r"
            SELECT c.id, c.name, c.is_group, c.admin_id, c.description,
                   c.last_message_id, c.last_message_sender_id, c.last_message_preview,
                   c.last_message_at, c.created_at, c.updated_at
            FROM conversations c
            WHERE NOT c.is_group
              AND EXISTS (SELECT 1 FROM conversation_participants WHERE conversation_id = c.id AND user_id = $1)
              AND EXISTS (SELECT 1 FROM conversation_participants WHERE conversation_id = c.id AND user_id = $2)
            LIMIT 1
            ",
        )
        .bind(user_a.into_inner())
        .bind(user_b.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Conversation::from))
    }

    #[instrument(skip(self, participants), fields(participants = participants.len()))]
    async fn create(
        &self,
        conversation: &Conversation,
        participants: &[Participant],
    ) -> RepoResult<()> {
        let row = ConversationInsert::new(conversation);
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        sqlx::query(
            r"
            INSERT INTO conversations (id, name, is_group, admin_id, description, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.is_group)
        .bind(row.admin_id)
        .bind(row.description)
        .bind(conversation.created_at)
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let user_ids: Vec<i64> = participants.iter().map(|p| p.user_id.into_inner()).collect();
        let joined: Vec<_> = participants.iter().map(|p| p.joined_at).collect();

        sqlx::query(
            r"
            INSERT INTO conversation_participants (conversation_id, user_id, joined_at)
            SELECT $1, u.user_id, u.joined_at
            FROM UNNEST($2::BIGINT[], $3::TIMESTAMPTZ[]) AS u(user_id, joined_at)
            ON CONFLICT DO NOTHING
            ",
        )
        .bind(row.id)
        .bind(&user_ids)
        .bind(&joined)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_foreign_key_violation(e, || DomainError::ValidationError(
            "one or more participants do not exist".to_string(),
        )))?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        let row = ConversationInsert::new(conversation);
        let result = sqlx::query(
            r"
            UPDATE conversations
            SET name = $2, description = $3, admin_id = $4, updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(row.id)
        .bind(row.name)
        .bind(row.description)
        .bind(row.admin_id)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConversationNotFound(conversation.id));
        }
        Ok(())
    }

    #[instrument(skip(self, conversation), fields(conversation_id = %conversation.id))]
    async fn remove_member(&self, conversation: &Conversation, user_id: Snowflake) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let removed = sqlx::query(
            "DELETE FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation.id.into_inner())
        .bind(user_id.into_inner())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let updated = sqlx::query(
            "UPDATE conversations SET admin_id = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(conversation.id.into_inner())
        .bind(conversation.admin_id.map(Snowflake::into_inner))
        .bind(conversation.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        if updated.rows_affected() == 0 {
            return Err(DomainError::ConversationNotFound(conversation.id));
        }

        tx.commit().await.map_err(map_db_error)?;
        Ok(removed.rows_affected() > 0)
    }

    #[instrument(skip(self, last_message))]
    async fn update_last_message(
        &self,
        conversation_id: Snowflake,
        last_message: &LastMessage,
    ) -> RepoResult<()> {
        let last = LastMessageColumns::new(last_message);
        // An out-of-order write must not replace a newer snapshot
        sqlx::query(
            r"
            UPDATE conversations
            SET last_message_id = $2, last_message_sender_id = $3,
                last_message_preview = $4, last_message_at = $5, updated_at = NOW()
            WHERE id = $1 AND (last_message_id IS NULL OR last_message_id <= $2)
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(last.message_id)
        .bind(last.sender_id)
        .bind(last.preview)
        .bind(last.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: Snowflake) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM conversations WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ConversationNotFound(id));
        }
        Ok(())
    }
}
