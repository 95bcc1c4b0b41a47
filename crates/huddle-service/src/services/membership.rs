//! Lookups and access checks shared by the conversation, message and
//! reaction services

use std::collections::HashMap;

use huddle_core::{Conversation, DomainError, LastMessage, Message, Snowflake, User};

use super::context::ServiceContext;
use super::error::ServiceResult;

pub(crate) async fn require_conversation(
    ctx: &ServiceContext,
    conversation_id: Snowflake,
) -> ServiceResult<Conversation> {
    Ok(ctx
        .conversation_repo()
        .find_by_id(conversation_id)
        .await?
        .ok_or(DomainError::ConversationNotFound(conversation_id))?)
}

pub(crate) async fn require_participant(
    ctx: &ServiceContext,
    conversation_id: Snowflake,
    user_id: Snowflake,
) -> ServiceResult<()> {
    if ctx
        .participant_repo()
        .is_participant(conversation_id, user_id)
        .await?
    {
        Ok(())
    } else {
        Err(DomainError::NotParticipant.into())
    }
}

/// Load a live message. When the request addressed it through a
/// conversation path, a message from elsewhere counts as missing.
pub(crate) async fn find_message(
    ctx: &ServiceContext,
    message_id: Snowflake,
    expected_conversation: Option<Snowflake>,
) -> ServiceResult<Message> {
    ctx.message_repo()
        .find_by_id(message_id)
        .await?
        .filter(|m| !m.is_deleted())
        .filter(|m| expected_conversation.map_or(true, |c| c == m.conversation_id))
        .ok_or_else(|| DomainError::MessageNotFound(message_id).into())
}

pub(crate) async fn load_users(
    ctx: &ServiceContext,
    ids: &[Snowflake],
) -> ServiceResult<HashMap<Snowflake, User>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let mut unique = ids.to_vec();
    unique.sort_unstable();
    unique.dedup();

    Ok(ctx
        .user_repo()
        .find_by_ids(&unique)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect())
}

/// Rewrite the conversation's last-message snapshot after the newest
/// message was edited or deleted
pub(crate) async fn refresh_preview(ctx: &ServiceContext, message: &Message) -> ServiceResult<()> {
    let conversation = require_conversation(ctx, message.conversation_id).await?;
    let is_latest = conversation
        .last_message
        .as_ref()
        .is_some_and(|last| last.message_id == message.id);
    if is_latest {
        ctx.conversation_repo()
            .update_last_message(message.conversation_id, &LastMessage::from_message(message))
            .await?;
    }
    Ok(())
}
