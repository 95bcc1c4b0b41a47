//! In-memory repositories and a ready-made context for service tests

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use huddle_cache::{RedisPool, RedisPoolConfig};
use huddle_common::{ChatConfig, JwtService};
use huddle_core::{
    Conversation, ConversationRepository, DomainError, LastMessage, Message, MessageQuery,
    MessageRepository, Notification, NotificationRepository, Participant, ParticipantRepository,
    Reaction, ReactionRepository, RepoResult, Snowflake, SnowflakeGenerator, User, UserRepository,
};

use super::context::ServiceContext;
use super::events::recording::RecordingPublisher;

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    conversations: Vec<Conversation>,
    participants: Vec<Participant>,
    messages: Vec<Message>,
    reactions: Vec<Reaction>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing_writes: AtomicBool,
}

impl MemoryStore {
    /// Make conversation writes fail from now on
    pub fn fail_writes(&self) {
        self.failing_writes.store(true, Ordering::SeqCst);
    }

    fn check_writes(&self) -> RepoResult<()> {
        if self.failing_writes.load(Ordering::SeqCst) {
            return Err(DomainError::DatabaseError("write refused".to_string()));
        }
        Ok(())
    }

    pub fn add_user(&self, id: i64, username: &str) -> User {
        let user = User::new(
            Snowflake::new(id),
            username.to_string(),
            format!("{username}@example.com"),
        );
        self.tables
            .lock()
            .unwrap()
            .users
            .push((user.clone(), String::new()));
        user
    }

    pub fn participants_of(&self, conversation_id: Snowflake) -> Vec<Snowflake> {
        self.tables
            .lock()
            .unwrap()
            .participants
            .iter()
            .filter(|p| p.conversation_id == conversation_id)
            .map(|p| p.user_id)
            .collect()
    }

    pub fn conversation(&self, id: Snowflake) -> Option<Conversation> {
        self.tables
            .lock()
            .unwrap()
            .conversations
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn notifications_for(&self, recipient: Snowflake) -> Vec<Notification> {
        self.tables
            .lock()
            .unwrap()
            .notifications
            .iter()
            .filter(|n| n.recipient_id == recipient)
            .cloned()
            .collect()
    }

    pub fn message_count(&self) -> usize {
        self.tables.lock().unwrap().messages.len()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().map(|(u, _)| u).find(|u| u.id == id).cloned())
    }

    async fn find_by_ids(&self, ids: &[Snowflake]) -> RepoResult<Vec<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .map(|(u, _)| u)
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().map(|(u, _)| u).find(|u| u.email == email).cloned())
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> RepoResult<Vec<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .map(|(u, _)| u)
            .filter(|u| usernames.iter().any(|n| n.eq_ignore_ascii_case(&u.username)))
            .cloned()
            .collect())
    }

    async fn search(&self, query: Option<&str>, limit: i64) -> RepoResult<Vec<User>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users
            .iter()
            .map(|(u, _)| u)
            .filter(|u| query.map_or(true, |q| u.username.contains(q)))
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn email_exists(&self, email: &str) -> RepoResult<bool> {
        Ok(self.find_by_email(email).await?.is_some())
    }

    async fn username_exists(&self, username: &str) -> RepoResult<bool> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().any(|(u, _)| u.username.eq_ignore_ascii_case(username)))
    }

    async fn create(&self, user: &User, password_hash: &str) -> RepoResult<()> {
        self.tables
            .lock()
            .unwrap()
            .users
            .push((user.clone(), password_hash.to_string()));
        Ok(())
    }

    async fn update(&self, user: &User) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some((u, _)) = t.users.iter_mut().find(|(u, _)| u.id == user.id) {
            *u = user.clone();
        }
        Ok(())
    }

    async fn get_password_hash(&self, id: Snowflake) -> RepoResult<Option<String>> {
        let t = self.tables.lock().unwrap();
        Ok(t.users.iter().find(|(u, _)| u.id == id).map(|(_, h)| h.clone()))
    }
}

#[async_trait]
impl ConversationRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Conversation>> {
        Ok(self.conversation(id))
    }

    async fn find_by_user(&self, user_id: Snowflake) -> RepoResult<Vec<(Conversation, Participant)>> {
        let t = self.tables.lock().unwrap();
        Ok(t.participants
            .iter()
            .filter(|p| p.user_id == user_id)
            .filter_map(|p| {
                t.conversations
                    .iter()
                    .find(|c| c.id == p.conversation_id)
                    .map(|c| (c.clone(), p.clone()))
            })
            .collect())
    }

    async fn find_direct(&self, a: Snowflake, b: Snowflake) -> RepoResult<Option<Conversation>> {
        let t = self.tables.lock().unwrap();
        let member = |c: &Conversation, u: Snowflake| {
            t.participants
                .iter()
                .any(|p| p.conversation_id == c.id && p.user_id == u)
        };
        Ok(t.conversations
            .iter()
            .find(|c| !c.is_group && member(c, a) && member(c, b))
            .cloned())
    }

    async fn create(&self, conversation: &Conversation, participants: &[Participant]) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.conversations.push(conversation.clone());
        t.participants.extend_from_slice(participants);
        Ok(())
    }

    async fn update(&self, conversation: &Conversation) -> RepoResult<()> {
        self.check_writes()?;
        let mut t = self.tables.lock().unwrap();
        if let Some(c) = t.conversations.iter_mut().find(|c| c.id == conversation.id) {
            c.name.clone_from(&conversation.name);
            c.description.clone_from(&conversation.description);
            c.admin_id = conversation.admin_id;
            c.updated_at = conversation.updated_at;
        }
        Ok(())
    }

    async fn remove_member(&self, conversation: &Conversation, user_id: Snowflake) -> RepoResult<bool> {
        self.check_writes()?;
        let mut t = self.tables.lock().unwrap();
        let before = t.participants.len();
        t.participants
            .retain(|p| !(p.conversation_id == conversation.id && p.user_id == user_id));
        if let Some(c) = t.conversations.iter_mut().find(|c| c.id == conversation.id) {
            c.admin_id = conversation.admin_id;
            c.updated_at = conversation.updated_at;
        }
        Ok(t.participants.len() != before)
    }

    async fn update_last_message(&self, conversation_id: Snowflake, last: &LastMessage) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(c) = t.conversations.iter_mut().find(|c| c.id == conversation_id) {
            let newer = c.last_message.as_ref().map_or(true, |m| m.message_id <= last.message_id);
            if newer {
                c.last_message = Some(last.clone());
            }
        }
        Ok(())
    }

    async fn delete(&self, id: Snowflake) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        t.conversations.retain(|c| c.id != id);
        t.participants.retain(|p| p.conversation_id != id);
        t.messages.retain(|m| m.conversation_id != id);
        Ok(())
    }
}

#[async_trait]
impl ParticipantRepository for MemoryStore {
    async fn find(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<Option<Participant>> {
        let t = self.tables.lock().unwrap();
        Ok(t.participants
            .iter()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
            .cloned())
    }

    async fn find_by_conversation(&self, conversation_id: Snowflake) -> RepoResult<Vec<Participant>> {
        let t = self.tables.lock().unwrap();
        Ok(t.participants
            .iter()
            .filter(|p| p.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn is_participant(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        Ok(ParticipantRepository::find(self, conversation_id, user_id)
            .await?
            .is_some())
    }

    async fn add(&self, participant: &Participant) -> RepoResult<()> {
        self.tables.lock().unwrap().participants.push(participant.clone());
        Ok(())
    }

    async fn remove(&self, conversation_id: Snowflake, user_id: Snowflake) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.participants.len();
        t.participants
            .retain(|p| !(p.conversation_id == conversation_id && p.user_id == user_id));
        Ok(t.participants.len() != before)
    }

    async fn increment_unread(&self, conversation_id: Snowflake, sender_id: Snowflake) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        for p in t
            .participants
            .iter_mut()
            .filter(|p| p.conversation_id == conversation_id && p.user_id != sender_id)
        {
            p.unread_count += 1;
        }
        Ok(())
    }

    async fn mark_read(
        &self,
        conversation_id: Snowflake,
        user_id: Snowflake,
        last_read_message_id: Option<Snowflake>,
    ) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(p) = t
            .participants
            .iter_mut()
            .find(|p| p.conversation_id == conversation_id && p.user_id == user_id)
        {
            p.unread_count = 0;
            p.last_read_message_id = last_read_message_id;
        }
        Ok(())
    }

    async fn count(&self, conversation_id: Snowflake) -> RepoResult<i64> {
        Ok(self.participants_of(conversation_id).len() as i64)
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Message>> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages
            .iter()
            .find(|m| m.id == id && !m.is_deleted())
            .cloned())
    }

    async fn find_by_nonce(&self, sender_id: Snowflake, nonce: &str) -> RepoResult<Option<Message>> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages
            .iter()
            .find(|m| m.sender_id == sender_id && m.nonce.as_deref() == Some(nonce))
            .cloned())
    }

    async fn find_by_conversation(&self, conversation_id: Snowflake, query: MessageQuery) -> RepoResult<Vec<Message>> {
        let t = self.tables.lock().unwrap();
        let mut page: Vec<Message> = t
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && !m.is_deleted())
            .filter(|m| query.before.map_or(true, |b| m.id < b))
            .filter(|m| query.after.map_or(true, |a| m.id > a))
            .cloned()
            .collect();
        page.sort_by_key(|m| m.id);
        let limit = query.limit.clamp(1, 100) as usize;
        if query.after.is_some() {
            page.truncate(limit);
        } else if page.len() > limit {
            page.drain(..page.len() - limit);
        }
        Ok(page)
    }

    async fn find_pinned(&self, conversation_id: Snowflake) -> RepoResult<Vec<Message>> {
        let t = self.tables.lock().unwrap();
        Ok(t.messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id && m.pinned && !m.is_deleted())
            .cloned()
            .collect())
    }

    async fn create(&self, message: &Message) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        let clash = message.nonce.is_some()
            && t
                .messages
                .iter()
                .any(|m| m.sender_id == message.sender_id && m.nonce == message.nonce);
        if clash {
            return Err(DomainError::DuplicateNonce);
        }
        t.messages.push(message.clone());
        Ok(())
    }

    async fn update_content(&self, message: &Message) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(m) = t.messages.iter_mut().find(|m| m.id == message.id) {
            m.content.clone_from(&message.content);
            m.edited = message.edited;
            m.edited_at = message.edited_at;
        }
        Ok(())
    }

    async fn set_pinned(&self, message: &Message) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(m) = t.messages.iter_mut().find(|m| m.id == message.id) {
            m.pinned = message.pinned;
            m.pinned_at = message.pinned_at;
            m.pinned_by = message.pinned_by;
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Snowflake) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(m) = t.messages.iter_mut().find(|m| m.id == id) {
            m.soft_delete();
        }
        Ok(())
    }
}

#[async_trait]
impl ReactionRepository for MemoryStore {
    async fn find_by_message(&self, message_id: Snowflake) -> RepoResult<Vec<Reaction>> {
        let t = self.tables.lock().unwrap();
        Ok(t.reactions
            .iter()
            .filter(|r| r.message_id == message_id)
            .cloned()
            .collect())
    }

    async fn find_by_messages(&self, message_ids: &[Snowflake]) -> RepoResult<Vec<Reaction>> {
        let t = self.tables.lock().unwrap();
        Ok(t.reactions
            .iter()
            .filter(|r| message_ids.contains(&r.message_id))
            .cloned()
            .collect())
    }

    async fn create(&self, reaction: &Reaction) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let exists = t.reactions.iter().any(|r| {
            r.message_id == reaction.message_id
                && r.user_id == reaction.user_id
                && r.emoji == reaction.emoji
        });
        if !exists {
            t.reactions.push(reaction.clone());
        }
        Ok(!exists)
    }

    async fn delete(&self, message_id: Snowflake, user_id: Snowflake, emoji: &str) -> RepoResult<bool> {
        let mut t = self.tables.lock().unwrap();
        let before = t.reactions.len();
        t.reactions
            .retain(|r| !(r.message_id == message_id && r.user_id == user_id && r.emoji == emoji));
        Ok(t.reactions.len() != before)
    }

    async fn delete_all(&self, message_id: Snowflake) -> RepoResult<()> {
        self.tables
            .lock()
            .unwrap()
            .reactions
            .retain(|r| r.message_id != message_id);
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn find_by_id(&self, id: Snowflake) -> RepoResult<Option<Notification>> {
        let t = self.tables.lock().unwrap();
        Ok(t.notifications.iter().find(|n| n.id == id).cloned())
    }

    async fn find_by_recipient(&self, recipient_id: Snowflake, unread_only: bool, limit: i64) -> RepoResult<Vec<Notification>> {
        let mut found: Vec<Notification> = self
            .notifications_for(recipient_id)
            .into_iter()
            .filter(|n| !unread_only || !n.is_read)
            .collect();
        found.sort_by(|a, b| b.id.cmp(&a.id));
        found.truncate(limit as usize);
        Ok(found)
    }

    async fn create(&self, notification: &Notification) -> RepoResult<()> {
        self.tables
            .lock()
            .unwrap()
            .notifications
            .push(notification.clone());
        Ok(())
    }

    async fn mark_read(&self, id: Snowflake) -> RepoResult<()> {
        let mut t = self.tables.lock().unwrap();
        if let Some(n) = t.notifications.iter_mut().find(|n| n.id == id) {
            n.mark_read();
        }
        Ok(())
    }

    async fn mark_all_read(&self, recipient_id: Snowflake) -> RepoResult<u64> {
        let mut t = self.tables.lock().unwrap();
        let mut updated = 0;
        for n in t
            .notifications
            .iter_mut()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
        {
            n.mark_read();
            updated += 1;
        }
        Ok(updated)
    }

    async fn delete(&self, id: Snowflake) -> RepoResult<()> {
        self.tables.lock().unwrap().notifications.retain(|n| n.id != id);
        Ok(())
    }

    async fn count_unread(&self, recipient_id: Snowflake) -> RepoResult<i64> {
        Ok(self
            .notifications_for(recipient_id)
            .iter()
            .filter(|n| !n.is_read)
            .count() as i64)
    }
}

/// Context over a fresh store. Redis is never reached: the pool is lazy
/// and events go to the recorder.
pub fn context() -> (ServiceContext, Arc<MemoryStore>, Arc<RecordingPublisher>) {
    let store = Arc::new(MemoryStore::default());
    let events = Arc::new(RecordingPublisher::default());
    let pool = RedisPool::new(RedisPoolConfig {
        url: "redis://127.0.0.1:1".to_string(),
        max_connections: 1,
    })
    .unwrap();

    let ctx = ServiceContext::builder()
        .redis_pool(pool)
        .user_repo(store.clone())
        .conversation_repo(store.clone())
        .participant_repo(store.clone())
        .message_repo(store.clone())
        .reaction_repo(store.clone())
        .notification_repo(store.clone())
        .event_publisher(events.clone())
        .jwt_service(Arc::new(JwtService::new("test-secret-test-secret-test-secret", 900, 3600)))
        .snowflake_generator(Arc::new(SnowflakeGenerator::new(1)))
        .chat_config(ChatConfig {
            max_group_size: 4,
            ..ChatConfig::default()
        })
        .build()
        .unwrap();
    (ctx, store, events)
}
