//! Per-conversation state reducer
//!
//! Folds gateway events into the message list, participant list and
//! typing set of one conversation. Every patch is keyed by message id,
//! so a replayed or duplicated event never appends twice. Events for
//! other conversations are ignored.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use huddle_core::Snowflake;

use crate::model::{Conversation, Message, MessagePage, Participant, Reaction};
use crate::protocol::ServerEvent;

/// A message shown before the server has stored it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalMessage {
    pub nonce: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation_id: Snowflake,
    me: Snowflake,
    name: Option<String>,
    description: Option<String>,
    admin_id: Option<Snowflake>,
    participants: Vec<Participant>,
    messages: BTreeMap<Snowflake, Message>,
    local: Vec<LocalMessage>,
    typing: BTreeSet<Snowflake>,
    /// Ids seen in `message_deleted`; late copies of them are dropped
    tombstones: BTreeSet<Snowflake>,
    removed: bool,
    deleted: bool,
}

impl ConversationState {
    pub fn new(conversation_id: Snowflake, me: Snowflake) -> Self {
        Self {
            conversation_id,
            me,
            name: None,
            description: None,
            admin_id: None,
            participants: Vec::new(),
            messages: BTreeMap::new(),
            local: Vec::new(),
            typing: BTreeSet::new(),
            tombstones: BTreeSet::new(),
            removed: false,
            deleted: false,
        }
    }

    pub fn from_conversation(conversation: &Conversation, me: Snowflake) -> Self {
        let mut state = Self::new(conversation.id, me);
        state.replace_details(conversation);
        state
    }

    /// Merge a history page under the same rules as live events
    pub fn load_history(&mut self, page: &MessagePage) {
        let id = self.conversation_id;
        for message in page.messages.iter().filter(|m| m.conversation_id == id) {
            self.upsert(message.clone());
        }
    }

    /// Show an outgoing message right away, keyed by its nonce
    pub fn push_local(&mut self, nonce: impl Into<String>, content: impl Into<String>) {
        self.local.push(LocalMessage {
            nonce: nonce.into(),
            content: content.into(),
            created_at: Utc::now(),
        });
    }

    /// Fold one event in; returns whether the state changed
    pub fn apply(&mut self, event: &ServerEvent) -> bool {
        if event.conversation_id() != Some(self.conversation_id) {
            return false;
        }

        match event {
            ServerEvent::ReceiveMessage(message) => {
                self.typing.remove(&message.sender_id);
                self.upsert((**message).clone())
            }
            ServerEvent::MessageSent(sent) => {
                if let Some(nonce) = sent.nonce.as_deref() {
                    self.local.retain(|l| l.nonce != nonce);
                }
                self.upsert(sent.message.clone());
                true
            }
            ServerEvent::MessageEdited(message) => self.edit((**message).clone()),
            ServerEvent::MessageDeleted(deleted) => {
                self.tombstones.insert(deleted.id);
                self.messages.remove(&deleted.id).is_some()
            }
            ServerEvent::ReactionUpdated(update) => {
                let Some(message) = self.messages.get_mut(&update.message_id) else {
                    return false;
                };
                message.reactions = dedup_reactions(&update.reactions);
                true
            }
            ServerEvent::MessagePinned(pin) => {
                let Some(message) = self.messages.get_mut(&pin.message_id) else {
                    return false;
                };
                message.pinned = pin.pinned;
                message.pinned_by = pin.pinned_by.filter(|_| pin.pinned);
                message.pinned_at = pin.pinned_at.filter(|_| pin.pinned);
                true
            }
            ServerEvent::UserTyping(typing) => {
                if typing.user_id == self.me {
                    return false;
                }
                if typing.is_typing {
                    self.typing.insert(typing.user_id)
                } else {
                    self.typing.remove(&typing.user_id)
                }
            }
            ServerEvent::MemberAdded(added) => {
                if self.participants.iter().any(|p| p.user.id == added.user.id) {
                    return false;
                }
                self.participants.push(Participant {
                    user: added.user.clone(),
                    joined_at: Utc::now(),
                    is_admin: false,
                });
                true
            }
            ServerEvent::MemberRemoved(removed) => {
                self.participants.retain(|p| p.user.id != removed.user_id);
                self.typing.remove(&removed.user_id);
                if let Some(admin) = removed.new_admin_id {
                    self.set_admin(admin);
                }
                if removed.user_id == self.me {
                    self.removed = true;
                }
                true
            }
            ServerEvent::ConversationUpdated(conversation) => {
                self.replace_details(conversation);
                true
            }
            ServerEvent::ConversationDeleted(_) => {
                self.deleted = true;
                true
            }
            _ => false,
        }
    }

    /// Insert or replace by id. Deleted ids stay deleted, and a copy
    /// older than the edit we hold is ignored.
    fn upsert(&mut self, message: Message) -> bool {
        if let Some(nonce) = message.nonce.as_deref() {
            self.local.retain(|l| l.nonce != nonce);
        }
        if self.tombstones.contains(&message.id) {
            return false;
        }
        if let Some(held) = self.messages.get(&message.id) {
            if is_stale(held, &message) {
                return false;
            }
        }
        let changed = self.messages.get(&message.id) != Some(&message);
        self.messages.insert(message.id, message);
        changed
    }

    /// Last write wins; an edit older than what we hold is dropped
    fn edit(&mut self, incoming: Message) -> bool {
        let Some(current) = self.messages.get_mut(&incoming.id) else {
            return false;
        };
        if let (Some(held), Some(new)) = (current.edited_at, incoming.edited_at) {
            if new < held {
                return false;
            }
        }
        current.content = incoming.content;
        current.edited = true;
        current.edited_at = incoming.edited_at;
        true
    }

    fn replace_details(&mut self, conversation: &Conversation) {
        self.name.clone_from(&conversation.name);
        self.description.clone_from(&conversation.description);
        self.admin_id = conversation.admin_id;
        if !conversation.participants.is_empty() {
            self.participants.clone_from(&conversation.participants);
        }
    }

    fn set_admin(&mut self, admin: Snowflake) {
        self.admin_id = Some(admin);
        for participant in &mut self.participants {
            participant.is_admin = participant.user.id == admin;
        }
    }

    pub fn conversation_id(&self) -> Snowflake {
        self.conversation_id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn admin_id(&self) -> Option<Snowflake> {
        self.admin_id
    }

    /// Stored messages, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.values()
    }

    pub fn message(&self, id: Snowflake) -> Option<&Message> {
        self.messages.get(&id)
    }

    pub fn local_messages(&self) -> &[LocalMessage] {
        &self.local
    }

    pub fn pinned(&self) -> impl Iterator<Item = &Message> {
        self.messages.values().filter(|m| m.pinned)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn typing_users(&self) -> impl Iterator<Item = Snowflake> + '_ {
        self.typing.iter().copied()
    }

    /// The current user was removed from the conversation
    pub fn is_removed(&self) -> bool {
        self.removed
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

fn is_stale(held: &Message, incoming: &Message) -> bool {
    match (held.edited_at, incoming.edited_at) {
        (Some(_), None) => true,
        (Some(held), Some(new)) => new < held,
        _ => false,
    }
}

fn dedup_reactions(reactions: &[Reaction]) -> Vec<Reaction> {
    let mut seen = BTreeSet::new();
    reactions
        .iter()
        .filter(|r| seen.insert((r.emoji.clone(), r.user_id)))
        .cloned()
        .collect()
}
