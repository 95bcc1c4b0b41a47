//! Redis Pub/Sub subscriber.
//!
//! Owns a dedicated Redis connection in a background task and forwards every
//! message to a `broadcast` channel. The task reconnects on failure and
//! re-subscribes to everything it was listening to.

use crate::pubsub::{PubSubChannel, PubSubEvent};
use futures_util::StreamExt;
use redis::Client;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Failed to parse event: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Channel closed")]
    ChannelClosed,
}

pub type SubscriberResult<T> = Result<T, SubscriberError>;

/// One message as it came off Redis
#[derive(Debug, Clone)]
pub struct ReceivedMessage {
    /// `None` for channels this crate does not name
    pub channel: Option<PubSubChannel>,
    /// `None` when the payload is not a [`PubSubEvent`]
    pub event: Option<PubSubEvent>,
    pub payload: String,
}

impl ReceivedMessage {
    fn from_redis(channel_name: &str, payload: String) -> Self {
        Self {
            channel: PubSubChannel::parse(channel_name),
            event: serde_json::from_str(&payload).ok(),
            payload,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub redis_url: String,
    pub broadcast_buffer: usize,
    pub reconnect_delay_ms: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379".to_string(),
            broadcast_buffer: 1024,
            reconnect_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum Subscription {
    Channel(String),
    Pattern(String),
}

#[derive(Debug)]
enum SubscriberCommand {
    Subscribe(Vec<Subscription>),
    Unsubscribe(Vec<Subscription>),
    Shutdown,
}

pub struct Subscriber {
    subscribed: Arc<RwLock<HashSet<Subscription>>>,
    broadcast_tx: broadcast::Sender<ReceivedMessage>,
    control_tx: mpsc::Sender<SubscriberCommand>,
}

impl Subscriber {
    /// Spawn the background listener. Subscriptions are added afterwards.
    pub fn new(config: SubscriberConfig) -> Self {
        let (broadcast_tx, _) = broadcast::channel(config.broadcast_buffer);
        let (control_tx, control_rx) = mpsc::channel(32);
        let subscribed = Arc::new(RwLock::new(HashSet::new()));

        tokio::spawn(Self::listener_loop(
            config,
            Arc::clone(&subscribed),
            broadcast_tx.clone(),
            control_rx,
        ));

        Self {
            subscribed,
            broadcast_tx,
            control_tx,
        }
    }

    async fn listener_loop(
        config: SubscriberConfig,
        subscribed: Arc<RwLock<HashSet<Subscription>>>,
        broadcast_tx: broadcast::Sender<ReceivedMessage>,
        mut control_rx: mpsc::Receiver<SubscriberCommand>,
    ) {
        loop {
            match Self::run_listener(&config, &subscribed, &broadcast_tx, &mut control_rx).await {
                Ok(true) => {
                    tracing::info!("Subscriber shutting down");
                    break;
                }
                Ok(false) => {
                    tracing::warn!("Pub/Sub stream ended, reconnecting");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Subscriber error, reconnecting");
                }
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(config.reconnect_delay_ms)).await;
        }
    }

    /// Runs until the connection drops (`Ok(false)`), shutdown (`Ok(true)`) or an error
    async fn run_listener(
        config: &SubscriberConfig,
        subscribed: &Arc<RwLock<HashSet<Subscription>>>,
        broadcast_tx: &broadcast::Sender<ReceivedMessage>,
        control_rx: &mut mpsc::Receiver<SubscriberCommand>,
    ) -> SubscriberResult<bool> {
        let client = Client::open(config.redis_url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        {
            let existing = subscribed.read().await;
            for subscription in existing.iter() {
                match subscription {
                    Subscription::Channel(name) => pubsub.subscribe(name).await?,
                    Subscription::Pattern(pattern) => pubsub.psubscribe(pattern).await?,
                }
            }
        }

        tracing::info!("Subscriber connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                msg = stream.next() => {
                    let Some(msg) = msg else {
                        return Ok(false);
                    };
                    let channel_name = msg.get_channel_name().to_string();
                    let payload: String = msg.get_payload().unwrap_or_default();

                    tracing::trace!(channel = %channel_name, "Received Pub/Sub message");

                    // No receivers is fine
                    let _ = broadcast_tx.send(ReceivedMessage::from_redis(&channel_name, payload));
                }

                cmd = control_rx.recv() => {
                    match cmd {
                        Some(SubscriberCommand::Subscribe(subscriptions)) => {
                            // the stream borrows the connection
                            drop(stream);
                            for subscription in subscriptions {
                                let result = match &subscription {
                                    Subscription::Channel(name) => pubsub.subscribe(name).await,
                                    Subscription::Pattern(pattern) => pubsub.psubscribe(pattern).await,
                                };
                                match result {
                                    Ok(()) => {
                                        tracing::debug!(subscription = ?subscription, "Subscribed");
                                        subscribed.write().await.insert(subscription);
                                    }
                                    Err(e) => {
                                        tracing::error!(subscription = ?subscription, error = %e, "Failed to subscribe");
                                    }
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Unsubscribe(subscriptions)) => {
                            drop(stream);
                            for subscription in subscriptions {
                                let result = match &subscription {
                                    Subscription::Channel(name) => pubsub.unsubscribe(name).await,
                                    Subscription::Pattern(pattern) => pubsub.punsubscribe(pattern).await,
                                };
                                match result {
                                    Ok(()) => {
                                        tracing::debug!(subscription = ?subscription, "Unsubscribed");
                                        subscribed.write().await.remove(&subscription);
                                    }
                                    Err(e) => {
                                        tracing::error!(subscription = ?subscription, error = %e, "Failed to unsubscribe");
                                    }
                                }
                            }
                            stream = pubsub.on_message();
                        }
                        Some(SubscriberCommand::Shutdown) | None => return Ok(true),
                    }
                }
            }
        }
    }

    async fn send(&self, command: SubscriberCommand) -> SubscriberResult<()> {
        self.control_tx
            .send(command)
            .await
            .map_err(|_| SubscriberError::ChannelClosed)
    }

    pub async fn subscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let subscriptions = channels
            .iter()
            .map(|c| Subscription::Channel(c.name()))
            .collect();
        self.send(SubscriberCommand::Subscribe(subscriptions)).await
    }

    pub async fn unsubscribe(&self, channels: &[PubSubChannel]) -> SubscriberResult<()> {
        let subscriptions = channels
            .iter()
            .map(|c| Subscription::Channel(c.name()))
            .collect();
        self.send(SubscriberCommand::Unsubscribe(subscriptions)).await
    }

    /// Subscribe to every channel of the given kinds, e.g. all conversations
    pub async fn subscribe_all_of(&self, kinds: &[PubSubChannel]) -> SubscriberResult<()> {
        let subscriptions = kinds
            .iter()
            .map(|c| match c {
                PubSubChannel::Broadcast => Subscription::Channel(c.name()),
                _ => Subscription::Pattern(c.pattern()),
            })
            .collect();
        self.send(SubscriberCommand::Subscribe(subscriptions)).await
    }

    #[must_use]
    pub fn receiver(&self) -> broadcast::Receiver<ReceivedMessage> {
        self.broadcast_tx.subscribe()
    }

    /// Channel names and patterns currently subscribed
    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscribed
            .read()
            .await
            .iter()
            .map(|s| match s {
                Subscription::Channel(name) | Subscription::Pattern(name) => name.clone(),
            })
            .collect()
    }

    pub async fn shutdown(&self) -> SubscriberResult<()> {
        self.send(SubscriberCommand::Shutdown).await
    }
}

pub struct SubscriberBuilder {
    config: SubscriberConfig,
    initial_channels: Vec<PubSubChannel>,
    initial_kinds: Vec<PubSubChannel>,
}

impl SubscriberBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: SubscriberConfig::default(),
            initial_channels: Vec::new(),
            initial_kinds: Vec::new(),
        }
    }

    #[must_use]
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    #[must_use]
    pub fn broadcast_buffer(mut self, size: usize) -> Self {
        self.config.broadcast_buffer = size;
        self
    }

    #[must_use]
    pub fn reconnect_delay_ms(mut self, delay: u64) -> Self {
        self.config.reconnect_delay_ms = delay;
        self
    }

    #[must_use]
    pub fn subscribe(mut self, channel: PubSubChannel) -> Self {
        self.initial_channels.push(channel);
        self
    }

    /// See [`Subscriber::subscribe_all_of`]
    #[must_use]
    pub fn subscribe_all_of(mut self, kind: PubSubChannel) -> Self {
        self.initial_kinds.push(kind);
        self
    }

    pub async fn build(self) -> SubscriberResult<Subscriber> {
        let subscriber = Subscriber::new(self.config);

        if !self.initial_channels.is_empty() {
            subscriber.subscribe(&self.initial_channels).await?;
        }
        if !self.initial_kinds.is_empty() {
            subscriber.subscribe_all_of(&self.initial_kinds).await?;
        }

        Ok(subscriber)
    }
}

impl Default for SubscriberBuilder {
    fn default() -> Self {
        Self::new()
    }
}
