//! Presence service
//!
//! Connect/disconnect transitions, explicit status changes and typing
//! indicators. All of it lives in the shared Redis presence store; this
//! service decides what to broadcast.

use huddle_cache::{event_names, PresenceData};
use huddle_core::{DomainError, PresenceStatus, Snowflake};
use tracing::{info, instrument, warn};

use crate::dto::{PresenceResponse, TypingPayload};

use super::context::ServiceContext;
use super::error::ServiceResult;
use super::events::{event, Audience};

pub struct PresenceService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PresenceService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// A gateway session came up; broadcasts `user_status` when the user
    /// was offline before
    #[instrument(skip(self))]
    pub async fn connect(&self, user_id: Snowflake, session_id: &str) -> ServiceResult<PresenceResponse> {
        let transition = self.ctx.presence_store().connect(user_id, session_id).await?;
        let presence = PresenceResponse::from(&transition.presence);
        if transition.changed {
            info!(user_id = %user_id, "User came online");
            self.broadcast_status(&presence).await;
        }
        Ok(presence)
    }

    /// A gateway session ended; the last one takes the user offline
    #[instrument(skip(self))]
    pub async fn disconnect(&self, user_id: Snowflake, session_id: &str) -> ServiceResult<PresenceResponse> {
        let transition = self
            .ctx
            .presence_store()
            .disconnect(user_id, session_id)
            .await?;
        let presence = PresenceResponse::from(&transition.presence);
        if transition.changed {
            info!(user_id = %user_id, "User went offline");
            self.broadcast_status(&presence).await;
        }
        Ok(presence)
    }

    /// Explicit status change; always broadcasts `user_status_changed`
    #[instrument(skip(self, custom_status))]
    pub async fn set_status(
        &self,
        user_id: Snowflake,
        status: PresenceStatus,
        custom_status: Option<String>,
    ) -> ServiceResult<PresenceResponse> {
        let presence = self
            .ctx
            .presence_store()
            .set_status(user_id, status, custom_status)
            .await?;
        let presence = PresenceResponse::from(&presence);

        info!(user_id = %user_id, status = %status, "Presence status set");

        self.ctx
            .emit(
                Audience::broadcast(),
                event(event_names::USER_STATUS_CHANGED, &presence),
            )
            .await;
        Ok(presence)
    }

    /// Keep the presence record alive between heartbeats
    pub async fn heartbeat(&self, user_id: Snowflake) -> ServiceResult<()> {
        self.ctx.presence_store().refresh(user_id).await?;
        Ok(())
    }

    pub async fn get(&self, user_id: Snowflake) -> ServiceResult<PresenceResponse> {
        let presence = self
            .ctx
            .presence_store()
            .get(user_id)
            .await?
            .unwrap_or_else(|| PresenceData::offline(user_id));
        Ok(PresenceResponse::from(&presence))
    }

    /// Presence for many users, in order. Lookups that fail come back
    /// offline so a Redis hiccup never breaks a listing.
    pub async fn get_many(&self, user_ids: &[Snowflake]) -> Vec<PresenceData> {
        match self.ctx.presence_store().get_many(user_ids).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Presence lookup failed, reporting offline");
                user_ids.iter().copied().map(PresenceData::offline).collect()
            }
        }
    }

    /// Mark the user as typing and tell the room
    #[instrument(skip(self))]
    pub async fn start_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        self.ensure_participant(conversation_id, user_id).await?;
        self.ctx
            .presence_store()
            .set_typing(conversation_id, user_id)
            .await?;
        self.publish_typing(conversation_id, user_id, true).await;
        Ok(())
    }

    /// Clear the typing flag. Returns whether it was set; nothing is
    /// broadcast otherwise.
    #[instrument(skip(self))]
    pub async fn stop_typing(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<bool> {
        let was_typing = self
            .ctx
            .presence_store()
            .clear_typing(conversation_id, user_id)
            .await?;
        if was_typing {
            self.publish_typing(conversation_id, user_id, false).await;
        }
        Ok(was_typing)
    }

    /// Broadcast `user_typing {is_typing: false}` without touching Redis,
    /// used when the key has already expired on its own
    pub async fn typing_expired(&self, conversation_id: Snowflake, user_id: Snowflake) {
        self.publish_typing(conversation_id, user_id, false).await;
    }

    async fn ensure_participant(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        if self
            .ctx
            .participant_repo()
            .is_participant(conversation_id, user_id)
            .await?
        {
            Ok(())
        } else {
            Err(DomainError::NotParticipant.into())
        }
    }

    async fn publish_typing(&self, conversation_id: Snowflake, user_id: Snowflake, is_typing: bool) {
        let payload = TypingPayload {
            conversation_id,
            user_id,
            is_typing,
        };
        let event = event(event_names::USER_TYPING, &payload).map(|e| e.excluding_user(user_id));
        self.ctx.emit(Audience::room(conversation_id), event).await;
    }

    async fn broadcast_status(&self, presence: &PresenceResponse) {
        self.ctx
            .emit(Audience::broadcast(), event(event_names::USER_STATUS, presence))
            .await;
    }
}
