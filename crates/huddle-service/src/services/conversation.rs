//! Conversation service
//!
//! Listing, creating and managing 1:1 and group conversations. Every
//! membership mutation publishes its own event (`member_added`,
//! `member_removed`, `conversation_updated`, `conversation_deleted`) to the
//! room and to the affected users' channels; clients never have to.

use chrono::Utc;
use huddle_cache::event_names;
use huddle_core::value_objects::matches_search;
use huddle_core::{Conversation, DomainError, NotificationKind, Participant, Snowflake};
use tracing::{info, instrument, warn};
use validator::Validate;

use crate::dto::{
    ConversationDeletedPayload, ConversationResponse, ConversationView, CreateConversationRequest,
    CreatedConversation, ListConversationsQuery, MemberAddedPayload, MemberRemovedPayload,
    NewConversation, UpdateConversationRequest, UserResponse,
};

use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::events::{event, Audience};
use super::membership::{load_users, require_conversation, require_participant};
use super::notification::NotificationService;

/// A membership event reported by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MembershipChange {
    Added,
    Removed,
}

pub struct ConversationService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> ConversationService<'a> {
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// The caller's conversations, newest activity first, filtered and
    /// searched server-side
    #[instrument(skip(self, query))]
    pub async fn list(
        &self,
        user_id: Snowflake,
        query: ListConversationsQuery,
    ) -> ServiceResult<Vec<ConversationResponse>> {
        let mut rows: Vec<(Conversation, Participant)> = self
            .ctx
            .conversation_repo()
            .find_by_user(user_id)
            .await?
            .into_iter()
            .filter(|(c, own)| query.filter.accepts(c.is_group, own.unread_count))
            .collect();
        rows.sort_by(|(a, _), (b, _)| b.last_activity().cmp(&a.last_activity()));

        let mut members: Vec<Vec<Participant>> = Vec::with_capacity(rows.len());
        for (conversation, _) in &rows {
            members.push(
                self.ctx
                    .participant_repo()
                    .find_by_conversation(conversation.id)
                    .await?,
            );
        }
        let all_ids: Vec<Snowflake> = members.iter().flatten().map(|p| p.user_id).collect();
        let users = load_users(self.ctx, &all_ids).await?;

        let search = query.search.unwrap_or_default();
        Ok(rows
            .iter()
            .zip(members.iter())
            .map(|((conversation, _), participants)| ConversationView {
                conversation,
                participants,
                users: &users,
                viewer: user_id,
            })
            .filter(|view| matches_search(&view.display_name(), &search))
            .map(ConversationResponse::from)
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, user_id: Snowflake, conversation_id: Snowflake) -> ServiceResult<ConversationResponse> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;
        if !participants.iter().any(|p| p.user_id == user_id) {
            return Err(DomainError::NotParticipant.into());
        }
        self.render(&conversation, &participants, user_id).await
    }

    /// Fails with `NOT_PARTICIPANT` unless the user belongs to the conversation
    pub async fn ensure_participant(&self, conversation_id: Snowflake, user_id: Snowflake) -> ServiceResult<()> {
        require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, user_id).await
    }

    /// Open a 1:1 (returning the existing one if any) or create a group
    #[instrument(skip(self, request))]
    pub async fn create(
        &self,
        creator: Snowflake,
        request: CreateConversationRequest,
    ) -> ServiceResult<CreatedConversation> {
        request.validate()?;
        match request.into_kind() {
            Some(NewConversation::Direct { participant_id }) => {
                self.open_direct(creator, participant_id).await
            }
            Some(NewConversation::Group {
                name,
                participant_ids,
                description,
            }) => {
                self.create_group(creator, &name, participant_ids, description)
                    .await
            }
            None => Err(ServiceError::validation(
                "either participant_id or name is required",
            )),
        }
    }

    async fn open_direct(&self, creator: Snowflake, other: Snowflake) -> ServiceResult<CreatedConversation> {
        if creator == other {
            return Err(DomainError::CannotMessageSelf.into());
        }
        if self.ctx.user_repo().find_by_id(other).await?.is_none() {
            return Err(DomainError::UserNotFound(other).into());
        }

        if let Some(existing) = self.ctx.conversation_repo().find_direct(creator, other).await? {
            let participants = self
                .ctx
                .participant_repo()
                .find_by_conversation(existing.id)
                .await?;
            return Ok(CreatedConversation {
                conversation: self.render(&existing, &participants, creator).await?,
                created: false,
            });
        }

        let conversation = Conversation::new_direct(self.ctx.generate_id());
        let participants = vec![
            Participant::new(conversation.id, creator),
            Participant::new(conversation.id, other),
        ];
        self.ctx
            .conversation_repo()
            .create(&conversation, &participants)
            .await?;

        info!(conversation_id = %conversation.id, "Direct conversation created");

        let response = self.render(&conversation, &participants, creator).await?;
        self.ctx
            .emit(
                Audience::users([creator, other]),
                event(event_names::CONVERSATION_CREATED, &response),
            )
            .await;

        Ok(CreatedConversation {
            conversation: response,
            created: true,
        })
    }

    async fn create_group(
        &self,
        admin: Snowflake,
        name: &str,
        participant_ids: Vec<Snowflake>,
        description: Option<String>,
    ) -> ServiceResult<CreatedConversation> {
        let mut others: Vec<Snowflake> = participant_ids.into_iter().filter(|id| *id != admin).collect();
        others.sort_unstable();
        others.dedup();

        if others.is_empty() {
            return Err(DomainError::GroupNeedsParticipants.into());
        }
        let max = self.ctx.chat().max_group_size;
        if others.len() + 1 > max {
            return Err(DomainError::GroupTooLarge { max }.into());
        }

        let found = load_users(self.ctx, &others).await?;
        if let Some(missing) = others.iter().find(|id| !found.contains_key(id)) {
            return Err(DomainError::UserNotFound(*missing).into());
        }

        let conversation = Conversation::new_group(self.ctx.generate_id(), name, admin, description)?;
        let participants: Vec<Participant> = std::iter::once(admin)
            .chain(others.iter().copied())
            .map(|user_id| Participant::new(conversation.id, user_id))
            .collect();
        self.ctx
            .conversation_repo()
            .create(&conversation, &participants)
            .await?;

        info!(
            conversation_id = %conversation.id,
            participants = participants.len(),
            "Group conversation created"
        );

        let response = self.render(&conversation, &participants, admin).await?;
        self.ctx
            .emit(
                Audience::users(participants.iter().map(|p| p.user_id)),
                event(event_names::CONVERSATION_CREATED, &response),
            )
            .await;

        let group_name = conversation.name.clone().unwrap_or_default();
        for user_id in &others {
            self.notify_quietly(
                *user_id,
                NotificationKind::AddedToGroup,
                format!("You were added to {group_name}"),
                conversation.id,
            )
            .await;
        }

        Ok(CreatedConversation {
            conversation: response,
            created: true,
        })
    }

    /// Rename or describe a group. Admin only.
    #[instrument(skip(self, request))]
    pub async fn update(
        &self,
        user_id: Snowflake,
        conversation_id: Snowflake,
        request: UpdateConversationRequest,
    ) -> ServiceResult<ConversationResponse> {
        request.validate()?;
        let mut conversation = require_conversation(self.ctx, conversation_id).await?;
        conversation.ensure_admin(user_id)?;

        if let Some(name) = &request.name {
            conversation.rename(name)?;
        }
        if let Some(description) = request.description {
            conversation.set_description(Some(description));
        }
        self.ctx.conversation_repo().update(&conversation).await?;

        info!(conversation_id = %conversation_id, "Conversation updated");

        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;
        let response = self.render(&conversation, &participants, user_id).await?;
        self.ctx
            .emit(
                Audience::room(conversation_id).and_users(participants.iter().map(|p| p.user_id)),
                event(event_names::CONVERSATION_UPDATED, &response),
            )
            .await;
        Ok(response)
    }

    /// Leave a group. The admin role passes to the longest-standing
    /// member; the last one out deletes the group.
    #[instrument(skip(self))]
    pub async fn leave(&self, user_id: Snowflake, conversation_id: Snowflake) -> ServiceResult<()> {
        let mut conversation = require_conversation(self.ctx, conversation_id).await?;
        if !conversation.is_group {
            return Err(DomainError::CannotLeaveDirect.into());
        }

        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;
        if !participants.iter().any(|p| p.user_id == user_id) {
            return Err(DomainError::NotParticipant.into());
        }

        if participants.len() == 1 {
            self.ctx.conversation_repo().delete(conversation_id).await?;
            info!(conversation_id = %conversation_id, "Last participant left, group deleted");
            self.ctx
                .emit(
                    Audience::room(conversation_id).and_users([user_id]),
                    event(
                        event_names::CONVERSATION_DELETED,
                        &ConversationDeletedPayload { conversation_id },
                    ),
                )
                .await;
            return Ok(());
        }

        let mut new_admin_id = None;
        if conversation.is_admin(user_id) {
            new_admin_id = Conversation::successor_admin(&participants, user_id);
            conversation.admin_id = new_admin_id;
            conversation.updated_at = Utc::now();
        }
        self.ctx
            .conversation_repo()
            .remove_member(&conversation, user_id)
            .await?;

        info!(
            conversation_id = %conversation_id,
            user_id = %user_id,
            new_admin_id = ?new_admin_id,
            "Participant left"
        );

        let payload = MemberRemovedPayload {
            conversation_id,
            user_id,
            removed_by: Some(user_id),
            new_admin_id,
        };
        self.ctx
            .emit(
                Audience::room(conversation_id).and_users(participants.iter().map(|p| p.user_id)),
                event(event_names::MEMBER_REMOVED, &payload),
            )
            .await;
        Ok(())
    }

    /// Delete a conversation: the admin deletes a group, either side a 1:1
    #[instrument(skip(self))]
    pub async fn delete(&self, user_id: Snowflake, conversation_id: Snowflake) -> ServiceResult<()> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;
        if !participants.iter().any(|p| p.user_id == user_id) {
            return Err(DomainError::NotParticipant.into());
        }
        if !conversation.can_delete(user_id) {
            return Err(DomainError::NotGroupAdmin.into());
        }

        self.ctx.conversation_repo().delete(conversation_id).await?;

        info!(conversation_id = %conversation_id, "Conversation deleted");

        self.ctx
            .emit(
                Audience::room(conversation_id).and_users(participants.iter().map(|p| p.user_id)),
                event(
                    event_names::CONVERSATION_DELETED,
                    &ConversationDeletedPayload { conversation_id },
                ),
            )
            .await;
        Ok(())
    }

    /// Add someone to a group. Admin only.
    #[instrument(skip(self))]
    pub async fn add_participant(
        &self,
        admin: Snowflake,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<ConversationResponse> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        conversation.ensure_admin(admin)?;

        let user = self
            .ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or(DomainError::UserNotFound(user_id))?;

        if self
            .ctx
            .participant_repo()
            .is_participant(conversation_id, user_id)
            .await?
        {
            return Err(DomainError::AlreadyParticipant.into());
        }
        let max = self.ctx.chat().max_group_size;
        let count = self.ctx.participant_repo().count(conversation_id).await?;
        if count as usize >= max {
            return Err(DomainError::GroupTooLarge { max }.into());
        }

        self.ctx
            .participant_repo()
            .add(&Participant::new(conversation_id, user_id))
            .await?;

        info!(conversation_id = %conversation_id, user_id = %user_id, "Participant added");

        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;
        let response = self.render(&conversation, &participants, admin).await?;

        let payload = MemberAddedPayload {
            conversation_id,
            user: UserResponse::from(&user),
            added_by: Some(admin),
        };
        let existing = participants.iter().map(|p| p.user_id).filter(|id| *id != user_id);
        self.ctx
            .emit(
                Audience::room(conversation_id).and_users(existing),
                event(event_names::MEMBER_ADDED, &payload),
            )
            .await;
        // The newcomer has never seen this conversation
        let for_newcomer = self.render(&conversation, &participants, user_id).await?;
        self.ctx
            .emit(
                Audience::users([user_id]),
                event(event_names::CONVERSATION_CREATED, &for_newcomer),
            )
            .await;

        let group_name = conversation.name.clone().unwrap_or_default();
        self.notify_quietly(
            user_id,
            NotificationKind::AddedToGroup,
            format!("You were added to {group_name}"),
            conversation_id,
        )
        .await;

        Ok(response)
    }

    /// Remove someone from a group. Admin only; the admin leaves instead.
    #[instrument(skip(self))]
    pub async fn remove_participant(
        &self,
        admin: Snowflake,
        conversation_id: Snowflake,
        user_id: Snowflake,
    ) -> ServiceResult<ConversationResponse> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        conversation.ensure_admin(admin)?;
        if user_id == admin {
            return Err(DomainError::AdminCannotRemoveSelf.into());
        }

        if !self
            .ctx
            .participant_repo()
            .remove(conversation_id, user_id)
            .await?
        {
            return Err(DomainError::ParticipantNotFound.into());
        }

        info!(conversation_id = %conversation_id, user_id = %user_id, "Participant removed");

        let participants = self
            .ctx
            .participant_repo()
            .find_by_conversation(conversation_id)
            .await?;

        let payload = MemberRemovedPayload {
            conversation_id,
            user_id,
            removed_by: Some(admin),
            new_admin_id: None,
        };
        self.ctx
            .emit(
                Audience::room(conversation_id)
                    .and_users(participants.iter().map(|p| p.user_id))
                    .and_users([user_id]),
                event(event_names::MEMBER_REMOVED, &payload),
            )
            .await;

        let group_name = conversation.name.clone().unwrap_or_default();
        self.notify_quietly(
            user_id,
            NotificationKind::RemovedFromGroup,
            format!("You were removed from {group_name}"),
            conversation_id,
        )
        .await;

        self.render(&conversation, &participants, admin).await
    }

    /// Reset the caller's unread counter
    #[instrument(skip(self))]
    pub async fn mark_read(&self, user_id: Snowflake, conversation_id: Snowflake) -> ServiceResult<()> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, user_id).await?;

        let last_read = conversation.last_message.as_ref().map(|m| m.message_id);
        self.ctx
            .participant_repo()
            .mark_read(conversation_id, user_id, last_read)
            .await?;
        Ok(())
    }

    /// Handle a client-reported membership event. Storage is the
    /// authority: the event is re-published only when it agrees.
    #[instrument(skip(self))]
    pub async fn reconcile_membership(
        &self,
        reporter: Snowflake,
        conversation_id: Snowflake,
        user_id: Snowflake,
        change: MembershipChange,
    ) -> ServiceResult<bool> {
        let conversation = require_conversation(self.ctx, conversation_id).await?;
        require_participant(self.ctx, conversation_id, reporter).await?;
        if !conversation.is_group {
            return Err(DomainError::NotAGroup.into());
        }

        let is_member = self
            .ctx
            .participant_repo()
            .is_participant(conversation_id, user_id)
            .await?;

        match (change, is_member) {
            (MembershipChange::Added, true) => {
                let user = self
                    .ctx
                    .user_repo()
                    .find_by_id(user_id)
                    .await?
                    .ok_or(DomainError::UserNotFound(user_id))?;
                let payload = MemberAddedPayload {
                    conversation_id,
                    user: UserResponse::from(&user),
                    added_by: None,
                };
                self.ctx
                    .emit(
                        Audience::room(conversation_id),
                        event(event_names::MEMBER_ADDED, &payload),
                    )
                    .await;
                Ok(true)
            }
            (MembershipChange::Removed, false) => {
                let payload = MemberRemovedPayload {
                    conversation_id,
                    user_id,
                    removed_by: None,
                    new_admin_id: None,
                };
                self.ctx
                    .emit(
                        Audience::room(conversation_id).and_users([user_id]),
                        event(event_names::MEMBER_REMOVED, &payload),
                    )
                    .await;
                Ok(true)
            }
            _ => {
                warn!(
                    conversation_id = %conversation_id,
                    user_id = %user_id,
                    change = ?change,
                    "Membership event does not match storage, dropped"
                );
                Ok(false)
            }
        }
    }

    async fn render(
        &self,
        conversation: &Conversation,
        participants: &[Participant],
        viewer: Snowflake,
    ) -> ServiceResult<ConversationResponse> {
        let ids: Vec<Snowflake> = participants.iter().map(|p| p.user_id).collect();
        let users = load_users(self.ctx, &ids).await?;
        Ok(ConversationResponse::from(ConversationView {
            conversation,
            participants,
            users: &users,
            viewer,
        }))
    }

    /// Notifications ride along with a mutation that already succeeded
    async fn notify_quietly(
        &self,
        recipient: Snowflake,
        kind: NotificationKind,
        title: String,
        conversation_id: Snowflake,
    ) {
        let result = NotificationService::new(self.ctx)
            .notify(recipient, kind, title, "", Some(conversation_id))
            .await;
        if let Err(e) = result {
            warn!(error = %e, recipient_id = %recipient, "Failed to create notification");
        }
    }
}
