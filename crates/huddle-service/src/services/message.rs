//! Message service
//!
//! Sending, history, edits, deletes and pins. A send is idempotent per
//! `(sender, nonce)`: a retried nonce returns the stored message and
//! publishes nothing new.

use huddle_cache::event_names;
use huddle_core::entities::{validate_content, validate_nonce};
use huddle_core::{DomainError, LastMessage, Message, MessageQuery, NotificationKind, Snowflake};
use tracing::{debug, info, instrument, warn};

use crate::dto::{
    MessageDeletedPayload, MessageHistoryQuery, MessagePage, MessagePinnedPayload,
    MessageResponse, SendMessageRequest,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::events::{event, Audience};
use super::membership::{
    find_message, load_users, refresh_preview, require_conversation, require_participant,
};
use super::notification::NotificationService;

const DEFAULT_HISTORY_LIMIT: i64 = 50;
const MAX_HISTORY_LIMIT: i64 = 100;

/// Result of a send
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub message: MessageResponse,
    /// The nonce matched an already stored message
    pub duplicate: bool,
}

pub struct MessageService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> MessageService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Store a message and fan it out to the conversation room.
    ///
    /// `origin_session` is the gateway session that sent it; that session
    /// gets a `message_sent` ack instead of the broadcast copy.
    #[instrument(skip(self, request), fields(nonce = ?request.nonce))]
    pub async fn send(
        &self,
        sender_id: Snowflake,
        conversation_id: Snowflake,
        request: SendMessageRequest,
        origin_session: Option<&str>,
    ) -> ServiceResult<SendOutcome> {
        let content = validate_content(&request.content, self.ctx.chat().max_message_length)?;
        let nonce = validate_nonce(request.nonce)?;

        require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, sender_id).await?;

        if let Some(nonce) = nonce.as_deref() {
            if let Some(existing) = self.existing_for_nonce(sender_id, conversation_id, nonce).await? {
                debug!(message_id = %existing.message.id, "Duplicate nonce, returning stored message");
                return Ok(existing);
            }
        }

        let message = Message::new(self.ctx.generate_id(), conversation_id, sender_id, content)
            .with_nonce(nonce.clone());

        match self.ctx.message_repo().create(&message).await {
            Ok(()) => {}
            // Lost a race with a concurrent retry of the same nonce
            Err(DomainError::DuplicateNonce) => {
                if let Some(nonce) = nonce.as_deref() {
                    if let Some(existing) =
                        self.existing_for_nonce(sender_id, conversation_id, nonce).await?
                    {
                        return Ok(existing);
                    }
                }
                return Err(DomainError::DuplicateNonce.into());
            }
            Err(e) => return Err(e.into()),
        }

        self.ctx
            .conversation_repo()
            .update_last_message(conversation_id, &LastMessage::from_message(&message))
            .await?;
        self.ctx
            .participant_repo()
            .increment_unread(conversation_id, sender_id)
            .await?;

        info!(
            message_id = %message.id,
            conversation_id = %conversation_id,
            sender_id = %sender_id,
            "Message sent"
        );

        let sender = self.ctx.user_repo().find_by_id(sender_id).await?;
        let response = MessageResponse::build(&message, sender.as_ref(), &[]);

        self.ctx
            .emit(
                Audience::room(conversation_id),
                event(event_names::RECEIVE_MESSAGE, &response)
                    .map(|e| e.excluding_session(origin_session)),
            )
            .await;

        self.notify_mentions(&message, sender.as_ref().map_or("", |u| u.visible_name()))
            .await;

        Ok(SendOutcome {
            message: response,
            duplicate: false,
        })
    }

    async fn existing_for_nonce(
        &self,
        sender_id: Snowflake,
        conversation_id: Snowflake,
        nonce: &str,
    ) -> ServiceResult<Option<SendOutcome>> {
        let Some(existing) = self.ctx.message_repo().find_by_nonce(sender_id, nonce).await? else {
            return Ok(None);
        };
        if existing.conversation_id != conversation_id {
            return Err(DomainError::DuplicateNonce.into());
        }
        let sender = self.ctx.user_repo().find_by_id(sender_id).await?;
        let reactions = self.ctx.reaction_repo().find_by_message(existing.id).await?;
        Ok(Some(SendOutcome {
            message: MessageResponse::build(&existing, sender.as_ref(), &reactions),
            duplicate: true,
        }))
    }

    /// Mentioned participants get a notification. The message is already
    /// stored, so failures here are only logged.
    async fn notify_mentions(&self, message: &Message, sender_name: &str) {
        let mentions = message.mentions();
        if mentions.is_empty() {
            return;
        }

        let users = match self.ctx.user_repo().find_by_usernames(&mentions).await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "Failed to resolve mentions");
                return;
            }
        };

        let notifications = NotificationService::new(self.ctx);
        for user in users.iter().filter(|u| u.id != message.sender_id) {
            match self
                .ctx
                .participant_repo()
                .is_participant(message.conversation_id, user.id)
                .await
            {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(error = %e, user_id = %user.id, "Failed to check mention target");
                    continue;
                }
            }

            let result = notifications
                .notify(
                    user.id,
                    NotificationKind::Mention,
                    format!("{sender_name} mentioned you"),
                    message.preview(huddle_core::entities::LAST_MESSAGE_PREVIEW_LEN),
                    Some(message.conversation_id),
                )
                .await;
            if let Err(e) = result {
                warn!(error = %e, user_id = %user.id, "Failed to create mention notification");
            }
        }
    }

    /// One page of history in ascending order. `has_more` is set when the
    /// page came back full.
    #[instrument(skip(self, query))]
    pub async fn history(
        &self,
        user_id: Snowflake,
        conversation_id: Snowflake,
        query: MessageHistoryQuery,
    ) -> ServiceResult<MessagePage> {
        let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if !(1..=MAX_HISTORY_LIMIT).contains(&limit) {
            return Err(ServiceError::validation(format!(
                "limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }

        require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, user_id).await?;

        let messages = self
            .ctx
            .message_repo()
            .find_by_conversation(
                conversation_id,
                MessageQuery {
                    before: query.before,
                    after: query.after,
                    limit,
                },
            )
            .await?;
        let has_more = messages.len() as i64 == limit;

        Ok(MessagePage {
            messages: self.render_all(&messages).await?,
            has_more,
        })
    }

    /// Pinned messages of a conversation
    #[instrument(skip(self))]
    pub async fn pins(&self, user_id: Snowflake, conversation_id: Snowflake) -> ServiceResult<Vec<MessageResponse>> {
        require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, user_id).await?;

        let messages = self.ctx.message_repo().find_pinned(conversation_id).await?;
        self.render_all(&messages).await
    }

    /// Replace the content. Sender only; the latest edit wins.
    #[instrument(skip(self, content))]
    pub async fn edit(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
        content: &str,
    ) -> ServiceResult<MessageResponse> {
        let mut message = find_message(self.ctx, message_id, expected_conversation).await?;
        if message.sender_id != user_id {
            return Err(DomainError::NotMessageSender.into());
        }
        require_participant(self.ctx, message.conversation_id, user_id).await?;

        let content = validate_content(content, self.ctx.chat().max_message_length)?;
        message.edit(content);
        self.ctx.message_repo().update_content(&message).await?;
        refresh_preview(self.ctx, &message).await?;

        info!(message_id = %message_id, "Message edited");

        let response = self.render(&message).await?;
        self.ctx
            .emit(
                Audience::room(message.conversation_id),
                event(event_names::MESSAGE_EDITED, &response),
            )
            .await;
        Ok(response)
    }

    /// Soft delete. The sender or the group admin may delete.
    #[instrument(skip(self))]
    pub async fn delete(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
    ) -> ServiceResult<()> {
        let mut message = find_message(self.ctx, message_id, expected_conversation).await?;
        let conversation = require_conversation(self.ctx, message.conversation_id).await?;
        require_participant(self.ctx, message.conversation_id, user_id).await?;

        if message.sender_id != user_id && !conversation.is_admin(user_id) {
            return Err(DomainError::NotMessageSender.into());
        }

        self.ctx.message_repo().soft_delete(message_id).await?;
        message.soft_delete();
        refresh_preview(self.ctx, &message).await?;

        info!(message_id = %message_id, deleted_by = %user_id, "Message deleted");

        self.ctx
            .emit(
                Audience::room(message.conversation_id),
                event(
                    event_names::MESSAGE_DELETED,
                    &MessageDeletedPayload {
                        id: message_id,
                        conversation_id: message.conversation_id,
                    },
                ),
            )
            .await;
        Ok(())
    }

    /// Pin or unpin; `None` toggles. Setting the current state is a no-op.
    #[instrument(skip(self))]
    pub async fn set_pinned(
        &self,
        user_id: Snowflake,
        message_id: Snowflake,
        expected_conversation: Option<Snowflake>,
        pinned: Option<bool>,
    ) -> ServiceResult<MessageResponse> {
        let mut message = find_message(self.ctx, message_id, expected_conversation).await?;
        require_participant(self.ctx, message.conversation_id, user_id).await?;

        let target = pinned.unwrap_or(!message.pinned);
        if target == message.pinned {
            return self.render(&message).await;
        }

        if target {
            message.pin(user_id);
        } else {
            message.unpin();
        }
        self.ctx.message_repo().set_pinned(&message).await?;

        info!(message_id = %message_id, pinned = target, "Message pin changed");

        self.ctx
            .emit(
                Audience::room(message.conversation_id),
                event(
                    event_names::MESSAGE_PINNED,
                    &MessagePinnedPayload {
                        message_id,
                        conversation_id: message.conversation_id,
                        pinned: message.pinned,
                        pinned_by: message.pinned_by,
                        pinned_at: message.pinned_at,
                    },
                ),
            )
            .await;
        self.render(&message).await
    }

    async fn render(&self, message: &Message) -> ServiceResult<MessageResponse> {
        let sender = self.ctx.user_repo().find_by_id(message.sender_id).await?;
        let reactions = self.ctx.reaction_repo().find_by_message(message.id).await?;
        Ok(MessageResponse::build(message, sender.as_ref(), &reactions))
    }

    async fn render_all(&self, messages: &[Message]) -> ServiceResult<Vec<MessageResponse>> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Snowflake> = messages.iter().map(|m| m.id).collect();
        let reactions = self.ctx.reaction_repo().find_by_messages(&ids).await?;
        let sender_ids: Vec<Snowflake> = messages.iter().map(|m| m.sender_id).collect();
        let senders = load_users(self.ctx, &sender_ids).await?;

        Ok(messages
            .iter()
            .map(|m| {
                let own: Vec<_> = reactions
                    .iter()
                    .filter(|r| r.message_id == m.id)
                    .cloned()
                    .collect();
                MessageResponse::build(m, senders.get(&m.sender_id), &own)
            })
            .collect())
    }
}
