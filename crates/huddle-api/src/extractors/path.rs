//! Path parameter extractors
//!
//! Ids arrive as decimal strings and are parsed into [`Snowflake`]s here
//! so handlers never see a malformed id.

use axum::{
    async_trait,
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use huddle_core::Snowflake;
use serde::Deserialize;

use crate::response::ApiError;

fn parse_id(raw: &str, name: &str) -> Result<Snowflake, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::invalid_path(format!("Invalid {name} format")))
}

async fn raw_path<S, T>(parts: &mut Parts, state: &S) -> Result<T, ApiError>
where
    S: Send + Sync,
    T: serde::de::DeserializeOwned + Send,
{
    let Path(raw) = Path::<T>::from_request_parts(parts, state)
        .await
        .map_err(|e| ApiError::invalid_path(e.to_string()))?;
    Ok(raw)
}

/// `/conversations/:conversation_id`
#[derive(Debug, Clone, Copy)]
pub struct ConversationPath {
    pub conversation_id: Snowflake,
}

#[derive(Deserialize)]
struct RawConversationPath {
    conversation_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ConversationPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw: RawConversationPath = raw_path(parts, state).await?;
        Ok(Self {
            conversation_id: parse_id(&raw.conversation_id, "conversation_id")?,
        })
    }
}

/// `/conversations/:conversation_id/messages/:message_id`
#[derive(Debug, Clone, Copy)]
pub struct MessagePath {
    pub conversation_id: Snowflake,
    pub message_id: Snowflake,
}

#[derive(Deserialize)]
struct RawMessagePath {
    conversation_id: String,
    message_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MessagePath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw: RawMessagePath = raw_path(parts, state).await?;
        Ok(Self {
            conversation_id: parse_id(&raw.conversation_id, "conversation_id")?,
            message_id: parse_id(&raw.message_id, "message_id")?,
        })
    }
}

/// `/conversations/:conversation_id/messages/:message_id/reactions/:emoji`
#[derive(Debug, Clone)]
pub struct ReactionPath {
    pub conversation_id: Snowflake,
    pub message_id: Snowflake,
    /// Percent-decoded by the router
    pub emoji: String,
}

#[derive(Deserialize)]
struct RawReactionPath {
    conversation_id: String,
    message_id: String,
    emoji: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ReactionPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw: RawReactionPath = raw_path(parts, state).await?;
        Ok(Self {
            conversation_id: parse_id(&raw.conversation_id, "conversation_id")?,
            message_id: parse_id(&raw.message_id, "message_id")?,
            emoji: raw.emoji,
        })
    }
}

/// `/notifications/:notification_id`
#[derive(Debug, Clone, Copy)]
pub struct NotificationPath {
    pub notification_id: Snowflake,
}

#[derive(Deserialize)]
struct RawNotificationPath {
    notification_id: String,
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for NotificationPath {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let raw: RawNotificationPath = raw_path(parts, state).await?;
        Ok(Self {
            notification_id: parse_id(&raw.notification_id, "notification_id")?,
        })
    }
}
