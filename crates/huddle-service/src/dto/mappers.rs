//! Entity to DTO mappers

use std::collections::HashMap;

use huddle_cache::PresenceData;
use huddle_core::{
    Conversation, LastMessage, Message, Notification, Participant, Reaction, Snowflake, User,
};

use super::responses::{
    ConversationResponse, CurrentUserResponse, LastMessageResponse, MessageResponse,
    NotificationResponse, ParticipantResponse, PresenceResponse, ReactionResponse, UserResponse,
    UserWithPresenceResponse,
};

// ============================================================================
// User Mappers
// ============================================================================

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            avatar: user.avatar.clone(),
        }
    }
}

impl From<&User> for CurrentUserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            display_name: user.display_name.clone(),
            email: user.email.clone(),
            avatar: user.avatar.clone(),
            created_at: user.created_at,
        }
    }
}

impl From<&PresenceData> for PresenceResponse {
    fn from(presence: &PresenceData) -> Self {
        Self {
            user_id: presence.user_id,
            status: presence.status,
            custom_status: presence.custom_status.clone(),
            last_seen: presence.last_seen,
        }
    }
}

impl UserWithPresenceResponse {
    pub fn new(user: &User, presence: &PresenceData) -> Self {
        Self {
            user: UserResponse::from(user),
            status: presence.status,
            custom_status: presence.custom_status.clone(),
            last_seen: presence.last_seen,
        }
    }
}

// ============================================================================
// Conversation Mappers
// ============================================================================

impl From<&LastMessage> for LastMessageResponse {
    fn from(last: &LastMessage) -> Self {
        Self {
            message_id: last.message_id,
            sender_id: last.sender_id,
            preview: last.preview.clone(),
            created_at: last.created_at,
        }
    }
}

/// A conversation with everything needed to render it for one viewer
#[derive(Debug, Clone)]
pub struct ConversationView<'a> {
    pub conversation: &'a Conversation,
    pub participants: &'a [Participant],
    pub users: &'a HashMap<Snowflake, User>,
    pub viewer: Snowflake,
}

impl ConversationView<'_> {
    /// Name to search on: the group name, or the other side of a 1:1
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.conversation.name {
            return name.clone();
        }
        self.participants
            .iter()
            .filter(|p| p.user_id != self.viewer)
            .filter_map(|p| self.users.get(&p.user_id))
            .map(|u| format!("{} {}", u.username, u.visible_name()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn unread_count(&self) -> i32 {
        self.participants
            .iter()
            .find(|p| p.user_id == self.viewer)
            .map_or(0, |p| p.unread_count)
    }
}

impl From<ConversationView<'_>> for ConversationResponse {
    fn from(view: ConversationView<'_>) -> Self {
        let conversation = view.conversation;
        let participants = view
            .participants
            .iter()
            .filter_map(|p| {
                view.users.get(&p.user_id).map(|user| ParticipantResponse {
                    user: UserResponse::from(user),
                    joined_at: p.joined_at,
                    is_admin: conversation.is_admin(p.user_id),
                })
            })
            .collect();

        Self {
            id: conversation.id,
            name: conversation.name.clone(),
            is_group: conversation.is_group,
            admin_id: conversation.admin_id,
            description: conversation.description.clone(),
            participants,
            last_message: conversation.last_message.as_ref().map(LastMessageResponse::from),
            unread_count: view.unread_count(),
            created_at: conversation.created_at,
            updated_at: conversation.updated_at,
        }
    }
}

// ============================================================================
// Message Mappers
// ============================================================================

impl From<&Reaction> for ReactionResponse {
    fn from(reaction: &Reaction) -> Self {
        Self {
            emoji: reaction.emoji.clone(),
            user_id: reaction.user_id,
        }
    }
}

/// Flatten reactions to `{emoji, user_id}` pairs, one per user and emoji
pub fn reaction_list(reactions: &[Reaction]) -> Vec<ReactionResponse> {
    huddle_core::entities::group_reactions(reactions)
        .into_iter()
        .flat_map(|group| {
            let emoji = group.emoji;
            group.user_ids.into_iter().map(move |user_id| ReactionResponse {
                emoji: emoji.clone(),
                user_id,
            })
        })
        .collect()
}

impl MessageResponse {
    pub fn build(message: &Message, sender: Option<&User>, reactions: &[Reaction]) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            sender_id: message.sender_id,
            sender: sender.map(UserResponse::from),
            content: message.content.clone(),
            nonce: message.nonce.clone(),
            created_at: message.created_at,
            edited: message.edited,
            edited_at: message.edited_at,
            pinned: message.pinned,
            pinned_at: message.pinned_at,
            pinned_by: message.pinned_by,
            reactions: reaction_list(reactions),
        }
    }
}

// ============================================================================
// Notification Mappers
// ============================================================================

impl From<&Notification> for NotificationResponse {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id,
            kind: notification.kind,
            title: notification.title.clone(),
            body: notification.body.clone(),
            conversation_id: notification.conversation_id,
            is_read: notification.is_read,
            created_at: notification.created_at,
        }
    }
}
