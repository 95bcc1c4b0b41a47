//! PostgreSQL implementation of ReactionRepository

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::instrument;

use huddle_core::entities::Reaction;
use huddle_core::traits::{ReactionRepository, RepoResult};
use huddle_core::value_objects::Snowflake;

use crate::models::ReactionModel;

use super::error::map_db_error;

#[derive(Clone)]
pub struct PgReactionRepository {
    pool: PgPool,
}

impl PgReactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReactionRepository for PgReactionRepository {
    #[instrument(skip(self))]
    async fn find_by_message(&self, message_id: Snowflake) -> RepoResult<Vec<Reaction>> {
        let results = sqlx::query_as::<_, ReactionModel>(
            r"
            SELECT message_id, user_id, emoji, created_at
            FROM reactions
            WHERE message_id = $1
            ORDER BY created_at, user_id
            ",
        )
        .bind(message_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Reaction::from).collect())
    }

    #[instrument(skip(self, message_ids), fields(count = message_ids.len()))]
    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>> {
        if message_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = message_ids.iter().map(|id| id.into_inner()).collect();

        let results = sqlx::query_as::<_, ReactionModel>(
            r"
            SELECT message_id, user_id, emoji, created_at
            FROM reactions
            WHERE message_id = ANY($1)
            ORDER BY message_id, created_at, user_id
            ",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(results.into_iter().map(Reaction::from).collect())
    }

    #[instrument(skip(self))]
    async fn create(&self, reaction: &Reaction) -> RepoResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO reactions (message_id, user_id, emoji, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (message_id, user_id, emoji) DO NOTHING
            ",
        )
        .bind(reaction.message_id.into_inner())
        .bind(reaction.user_id.into_inner())
        .bind(&reaction.emoji)
        .bind(reaction.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete(
        &self,
        message_id: Snowflake,
        user_id: Snowflake,
        emoji: &str,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "DELETE FROM reactions WHERE message_id = $1 AND user_id = $2 AND emoji = $3",
        )
        .bind(message_id.into_inner())
        .bind(user_id.into_inner())
        .bind(emoji)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self))]
    async fn delete_all(&self, message_id: Snowflake) -> RepoResult<()> {
        sqlx::query("DELETE FROM reactions WHERE message_id = $1")
            .bind(message_id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}
