//! Service context - dependency container for services
//!
//! Holds the repositories, Redis stores and the event publisher every
//! service needs. Cloning is cheap; everything sits behind `Arc`s or pools.

use std::sync::Arc;

use huddle_cache::{PresenceStore, Publisher, RedisPool, RefreshTokenStore};
use huddle_common::{ChatConfig, JwtService};
use huddle_core::{
    ConversationRepository, MessageRepository, NotificationRepository, ParticipantRepository,
    ReactionRepository, Snowflake, SnowflakeGenerator, UserRepository,
};

use super::error::{ServiceError, ServiceResult};
use super::events::{Audience, EventPublisher};
use huddle_cache::PubSubEvent;

#[derive(Clone)]
pub struct ServiceContext {
    // Repositories
    user_repo: Arc<dyn UserRepository>,
    conversation_repo: Arc<dyn ConversationRepository>,
    participant_repo: Arc<dyn ParticipantRepository>,
    message_repo: Arc<dyn MessageRepository>,
    reaction_repo: Arc<dyn ReactionRepository>,
    notification_repo: Arc<dyn NotificationRepository>,

    // Redis
    refresh_token_store: RefreshTokenStore,
    presence_store: PresenceStore,
    events: Arc<dyn EventPublisher>,

    jwt_service: Arc<JwtService>,
    snowflake_generator: Arc<SnowflakeGenerator>,
    chat: ChatConfig,
}

impl ServiceContext {
    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::new()
    }

    // === Repositories ===

    pub fn user_repo(&self) -> &dyn UserRepository {
        self.user_repo.as_ref()
    }

    pub fn conversation_repo(&self) -> &dyn ConversationRepository {
        self.conversation_repo.as_ref()
    }

    pub fn participant_repo(&self) -> &dyn ParticipantRepository {
        self.participant_repo.as_ref()
    }

    pub fn message_repo(&self) -> &dyn MessageRepository {
        self.message_repo.as_ref()
    }

    pub fn reaction_repo(&self) -> &dyn ReactionRepository {
        self.reaction_repo.as_ref()
    }

    pub fn notification_repo(&self) -> &dyn NotificationRepository {
        self.notification_repo.as_ref()
    }

    // === Cache Stores ===

    pub fn refresh_token_store(&self) -> &RefreshTokenStore {
        &self.refresh_token_store
    }

    pub fn presence_store(&self) -> &PresenceStore {
        &self.presence_store
    }

    // === Everything else ===

    pub fn jwt_service(&self) -> &JwtService {
        self.jwt_service.as_ref()
    }

    /// Chat limits and timeouts
    pub fn chat(&self) -> &ChatConfig {
        &self.chat
    }

    pub fn generate_id(&self) -> Snowflake {
        self.snowflake_generator.generate()
    }

    /// Publish an event. Delivery is best effort: the mutation already
    /// happened, so a failed publish is logged and swallowed. `None` is an
    /// event that could not be built and is skipped.
    pub(crate) async fn emit(&self, audience: Audience, event: Option<PubSubEvent>) {
        let Some(event) = event else {
            return;
        };
        if audience.channels().is_empty() {
            return;
        }
        let event = match audience.shared_room() {
            Some(room) => event.via_room(room),
            None => event,
        };
        if let Err(e) = self.events.publish_many(audience.channels(), &event).await {
            tracing::warn!(
                error = %e,
                event_type = %event.event_type,
                "Failed to publish event"
            );
        }
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("presence_store", &self.presence_store)
            .field("chat", &self.chat)
            .finish()
    }
}

/// Builder for [`ServiceContext`]
#[derive(Default)]
pub struct ServiceContextBuilder {
    redis_pool: Option<RedisPool>,
    user_repo: Option<Arc<dyn UserRepository>>,
    conversation_repo: Option<Arc<dyn ConversationRepository>>,
    participant_repo: Option<Arc<dyn ParticipantRepository>>,
    message_repo: Option<Arc<dyn MessageRepository>>,
    reaction_repo: Option<Arc<dyn ReactionRepository>>,
    notification_repo: Option<Arc<dyn NotificationRepository>>,
    event_publisher: Option<Arc<dyn EventPublisher>>,
    jwt_service: Option<Arc<JwtService>>,
    snowflake_generator: Option<Arc<SnowflakeGenerator>>,
    chat: Option<ChatConfig>,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn redis_pool(mut self, pool: RedisPool) -> Self {
        self.redis_pool = Some(pool);
        self
    }

    pub fn user_repo(mut self, repo: Arc<dyn UserRepository>) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn conversation_repo(mut self, repo: Arc<dyn ConversationRepository>) -> Self {
        self.conversation_repo = Some(repo);
        self
    }

    pub fn participant_repo(mut self, repo: Arc<dyn ParticipantRepository>) -> Self {
        self.participant_repo = Some(repo);
        self
    }

    pub fn message_repo(mut self, repo: Arc<dyn MessageRepository>) -> Self {
        self.message_repo = Some(repo);
        self
    }

    pub fn reaction_repo(mut self, repo: Arc<dyn ReactionRepository>) -> Self {
        self.reaction_repo = Some(repo);
        self
    }

    pub fn notification_repo(mut self, repo: Arc<dyn NotificationRepository>) -> Self {
        self.notification_repo = Some(repo);
        self
    }

    /// Override the Redis publisher built from the pool
    pub fn event_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = Some(publisher);
        self
    }

    pub fn jwt_service(mut self, service: Arc<JwtService>) -> Self {
        self.jwt_service = Some(service);
        self
    }

    pub fn snowflake_generator(mut self, generator: Arc<SnowflakeGenerator>) -> Self {
        self.snowflake_generator = Some(generator);
        self
    }

    pub fn chat_config(mut self, chat: ChatConfig) -> Self {
        self.chat = Some(chat);
        self
    }

    pub fn build(self) -> ServiceResult<ServiceContext> {
        let redis_pool = self
            .redis_pool
            .ok_or_else(|| ServiceError::validation("redis_pool is required"))?;
        let chat = self.chat.unwrap_or_default();
        let jwt_service = self
            .jwt_service
            .ok_or_else(|| ServiceError::validation("jwt_service is required"))?;
        let refresh_ttl = u64::try_from(jwt_service.refresh_token_expiry()).unwrap_or(1);

        let events: Arc<dyn EventPublisher> = match self.event_publisher {
            Some(publisher) => publisher,
            None => Arc::new(Publisher::new(redis_pool.clone())),
        };

        Ok(ServiceContext {
            user_repo: self
                .user_repo
                .ok_or_else(|| ServiceError::validation("user_repo is required"))?,
            conversation_repo: self
                .conversation_repo
                .ok_or_else(|| ServiceError::validation("conversation_repo is required"))?,
            participant_repo: self
                .participant_repo
                .ok_or_else(|| ServiceError::validation("participant_repo is required"))?,
            message_repo: self
                .message_repo
                .ok_or_else(|| ServiceError::validation("message_repo is required"))?,
            reaction_repo: self
                .reaction_repo
                .ok_or_else(|| ServiceError::validation("reaction_repo is required"))?,
            notification_repo: self
                .notification_repo
                .ok_or_else(|| ServiceError::validation("notification_repo is required"))?,
            refresh_token_store: RefreshTokenStore::with_ttl(redis_pool.clone(), refresh_ttl),
            presence_store: PresenceStore::from_config(redis_pool, &chat),
            events,
            jwt_service,
            snowflake_generator: self
                .snowflake_generator
                .ok_or_else(|| ServiceError::validation("snowflake_generator is required"))?,
            chat,
        })
    }
}
