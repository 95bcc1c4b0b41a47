//! Reaction service
//!
//! Add and remove emoji reactions. Both return the message's full
//! deduplicated reaction list; `reaction_updated` only goes out when
//! something actually changed.

use huddle_cache::event_names;
use huddle_core::entities::validate_emoji;
use huddle_core::{Message, Reaction, Snowflake};
use tracing::{debug, instrument};

use crate::dto::{reaction_list, ReactionResponse, ReactionUpdatedPayload};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::events::{event, Audience};
use super::membership::{find_message, require_participant};

pub struct ReactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ReactionService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    #[instrument(skip(self))]
    pub async fn add(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
        emoji: &str,
    ) -> ServiceResult<Vec<ReactionResponse>> {
        let emoji = validate_emoji(emoji)?;
        let message = self.reachable_message(user_id, message_id, expected_conversation).await?;

        let inserted = self
            .ctx
            .reaction_repo()
            .create(&Reaction::new(message_id, user_id, emoji))
            .await?;
        self.finish(&message, inserted).await
    }

    #[instrument(skip(self))]
    pub async fn remove(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
        emoji: &str,
    ) -> ServiceResult<Vec<ReactionResponse>> {
        let emoji = validate_emoji(emoji)?;
        let message = self.reachable_message(user_id, message_id, expected_conversation).await?;

        let removed = self
            .ctx
            .reaction_repo()
            .delete(message_id, user_id, &emoji)
            .await?;
        self.finish(&message, removed).await
    }

    async fn reachable_message(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
    ) -> ServiceResult<Message> {
        let message = find_message(self.ctx, message_id, expected_conversation).await?;
        require_participant(self.ctx, message.conversation_id, user_id).await?;
        Ok(message)
    }

    async fn finish(&self, message: &Message, changed: bool) -> ServiceResult<Vec<ReactionResponse>> {
        let reactions = reaction_list(&self.ctx.reaction_repo().find_by_message(message.id).await?);

        if changed {
            self.ctx
                .emit(
                    Audience::room(message.conversation_id),
                    event(
                        event_names::REACTION_UPDATED,
                        &ReactionUpdatedPayload {
                            message_id: message.id,
                            conversation_id: message.conversation_id,
                            reactions: reactions.clone(),
                        },
                    ),
                )
                .await;
        } else {
            debug!(message_id = %message.id, "Reaction unchanged");
        }
        Ok(reactions)
    }
}
