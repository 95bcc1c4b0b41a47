//! PostgreSQL implementation of ParticipantRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use huddle_core::entities::Participant;
use huddle_core::error::DomainError;
use huddle_core::traits::{ParticipantRepository, RepoResult};
use huddle_core::value_objects::Snowflake;

use crate::models::ParticipantModel;

use super::error::{map_db_error, map_unique_violation};

#[derive(Clone)]
pub struct PgParticipantRepository {
    pool: PgPool,
}

impl PgParticipantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParticipantRepository for PgParticipantRepository {
    #[instrument(skip(self))]
    async fn find(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<Option<Participant>> {
        let result = sqlx::query_as::<_, ParticipantModel>(
            r"
            SELECT conversation_id, user_id, joined_at, unread_count, last_read_message_id
            FROM conversation_participants
            WHERE conversation_id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.map(Participant::from))
    }

    #[instrument(skip(self))]
    async fn find_by_conversation(
        &self,
        conversation_id: Snowflake,
    ) -> RepoResult<Vec<Participant>> {
        let results = sqlx::query_as::<_, ParticipantModel>(
            r"
            SELECT conversation_id, user_id, joined_at, unread_count, last_read_message_id
            FROM conversation_participants
            WHERE conversation_id = $1
            ORDER BY joined_at, user_id
            ",
        )
        .bind(conversation_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Participant::from).collect())
    }

    #[instrument(skip(self))]
    async fn is_participant(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r"
            SELECT EXISTS(
                SELECT 1 FROM conversation_participants
                WHERE conversation_id = $1 AND user_id = $2
            )
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn add(&self, participant: &Participant) -> RepoResult<()> {
        sqlx::query(
            r"
            INSERT INTO conversation_participants (conversation_id, user_id, joined_at, unread_count)
            VALUES ($1, $2, $3, $4)
            ",
        )
        .bind(participant.conversation_id.into_inner())
        .bind(participant.user_id.into_inner())
        .bind(participant.joined_at)
        .bind(participant.unread_count)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, |_| DomainError::AlreadyParticipant))?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn remove(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM conversation_participants WHERE conversation_id = $1 AND user_id = $2",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn increment_unread(
        &self,
        conversation_id: Snowflake,
        sender_id: Snowflake,
    ) -> RepoResult<()> {
        sqlx::query(
            r"
            UPDATE conversation_participants
            SET unread_count = unread_count + 1
            WHERE conversation_id = $1 AND user_id <> $2
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(sender_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        last_read_message_id: Option<Snowflake>,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            r"
            UPDATE conversation_participants
            SET unread_count = 0,
                last_read_message_id = COALESCE($3, last_read_message_id)
            WHERE conversation_id = $1 AND user_id = $2
            ",
        )
        .bind(conversation_id.into_inner())
        .bind(user_id.into_inner())
        .bind(last_read_message_id.map(Snowflake::into_inner))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::NotParticipant);
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn count(&self, conversation_id: Snowflake) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM conversation_participants WHERE conversation_id = $1",
        )
        .bind(conversation_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }
}
