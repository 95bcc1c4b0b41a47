//! Typed bindings for the `/api/v1` REST surface

use std::sync::Arc;

use huddle_core::{ConversationFilter, PresenceStatus, Snowflake};
use parking_lot::{Mutex, RwLock};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, instrument};

use crate::bulk::{run_sequential, BulkProgress};
use crate::cache::TtlCache;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::model::{
    AuthTokens, Conversation, CreatedConversation, CurrentUser, MarkAllRead, Message, MessagePage,
    Notification, NotificationList, Presence, Reaction, UserWithPresence,
};

/// Cursor for `GET .../messages`
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct HistoryQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<Snowflake>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base: Url,
    token: Arc<RwLock<Option<String>>>,
    details: Arc<Mutex<TtlCache<Snowflake, Conversation>>>,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let mut client = Self::anonymous(&config.api_url, config.request_timeout)?;
        client.token = Arc::new(RwLock::new(Some(config.token.clone())));
        Ok(client)
    }

    /// Client without a token, for register and login
    pub fn anonymous(api_url: &str, timeout: std::time::Duration) -> ClientResult<Self> {
        let base = Url::parse(&format!("{}/api/v1/", api_url.trim_end_matches('/')))
            .map_err(|_| ClientError::Config("api_url is not a valid URL"))?;
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base,
            token: Arc::new(RwLock::new(None)),
            details: Arc::new(Mutex::new(TtlCache::default())),
        })
    }

    pub fn set_token(&self, token: impl Into<String>) {
        *self.token.write() = Some(token.into());
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn url(&self, segments: &[&str]) -> ClientResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| ClientError::Config("api_url cannot be a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ClientResult<RequestBuilder> {
        let mut builder = self.http.request(method, self.url(segments)?);
        if let Some(token) = self.token.read().as_deref() {
            builder = builder.bearer_auth(token);
        }
        Ok(builder)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_error_body(status.as_u16(), &body))
    }

    async fn expect_empty(response: Response) -> ClientResult<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(ClientError::from_error_body(status.as_u16(), &body))
    }

    fn messaging(path: &[&str]) -> Vec<String> {
        std::iter::once("messaging")
            .chain(path.iter().copied())
            .map(str::to_string)
            .collect()
    }

    async fn get<T: DeserializeOwned>(&self, path: &[&str]) -> ClientResult<T> {
        let segments = Self::messaging(path);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        Self::decode(self.request(Method::GET, &refs)?.send().await?).await
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &[&str],
        body: &B,
    ) -> ClientResult<T> {
        let segments = Self::messaging(path);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        Self::decode(self.request(method, &refs)?.json(body).send().await?).await
    }

    async fn send_empty(&self, method: Method, path: &[&str]) -> ClientResult<Response> {
        let segments = Self::messaging(path);
        let refs: Vec<&str> = segments.iter().map(String::as_str).collect();
        Ok(self.request(method, &refs)?.send().await?)
    }

    // ========================================================================
    // Auth
    // ========================================================================

    /// Log in and keep the access token for later calls
    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> ClientResult<AuthTokens> {
        let response = self
            .request(Method::POST, &["auth", "login"])?
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        let tokens: AuthTokens = Self::decode(response).await?;
        self.set_token(tokens.access_token.clone());
        Ok(tokens)
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        display_name: Option<&str>,
    ) -> ClientResult<AuthTokens> {
        let response = self
            .request(Method::POST, &["auth", "register"])?
            .json(&json!({
                "username": username,
                "email": email,
                "password": password,
                "display_name": display_name,
            }))
            .send()
            .await?;
        let tokens: AuthTokens = Self::decode(response).await?;
        self.set_token(tokens.access_token.clone());
        Ok(tokens)
    }

    pub async fn refresh(&self, refresh_token: &str) -> ClientResult<AuthTokens> {
        let response = self
            .request(Method::POST, &["auth", "refresh"])?
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let tokens: AuthTokens = Self::decode(response).await?;
        self.set_token(tokens.access_token.clone());
        Ok(tokens)
    }

    pub async fn logout(&self, refresh_token: Option<&str>) -> ClientResult<()> {
        let response = self
            .request(Method::POST, &["auth", "logout"])?
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        Self::expect_empty(response).await?;
        *self.token.write() = None;
        self.details.lock().clear();
        Ok(())
    }

    // ========================================================================
    // Conversations
    // ========================================================================

    pub async fn conversations(
        &self,
        filter: ConversationFilter,
        search: Option<&str>,
    ) -> ClientResult<Vec<Conversation>> {
        let mut request = self
            .request(Method::GET, &["messaging", "conversations"])?
            .query(&[("filter", filter)]);
        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            request = request.query(&[("search", search)]);
        }
        Self::decode(request.send().await?).await
    }

    /// Conversation detail, served from a five minute cache
    pub async fn conversation(&self, id: Snowflake) -> ClientResult<Conversation> {
        if let Some(cached) = self.details.lock().get(&id).cloned() {
            debug!(conversation_id = %id, "Conversation detail from cache");
            return Ok(cached);
        }
        let conversation: Conversation = self.get(&["conversations", &id.to_string()]).await?;
        self.details.lock().insert(id, conversation.clone());
        Ok(conversation)
    }

    fn remember(&self, conversation: &Conversation) {
        self.details.lock().insert(conversation.id, conversation.clone());
    }

    fn forget(&self, id: Snowflake) {
        self.details.lock().invalidate(&id);
    }

    /// Find or create the 1:1 with `user_id`
    pub async fn create_direct(&self, user_id: Snowflake) -> ClientResult<CreatedConversation> {
        let created: CreatedConversation = self
            .send_json(Method::POST, &["conversations"], &json!({ "participant_id": user_id }))
            .await?;
        self.remember(&created.conversation);
        Ok(created)
    }

    pub async fn create_group(
        &self,
        name: &str,
        participant_ids: &[Snowflake],
        description: Option<&str>,
    ) -> ClientResult<CreatedConversation> {
        let created: CreatedConversation = self
            .send_json(
                Method::POST,
                &["conversations"],
                &json!({
                    "name": name,
                    "participant_ids": participant_ids,
                    "description": description,
                }),
            )
            .await?;
        self.remember(&created.conversation);
        Ok(created)
    }

    pub async fn update_conversation(
        &self,
        id: Snowflake,
        name: Option<&str>,
        description: Option<&str>,
    ) -> ClientResult<Conversation> {
        let conversation: Conversation = self
            .send_json(
                Method::PATCH,
                &["conversations", &id.to_string()],
                &json!({ "name": name, "description": description }),
            )
            .await?;
        self.remember(&conversation);
        Ok(conversation)
    }

    pub async fn leave_conversation(&self, id: Snowflake) -> ClientResult<()> {
        self.forget(id);
        let response = self
            .send_empty(Method::POST, &["conversations", &id.to_string(), "leave"])
            .await?;
        Self::expect_empty(response).await
    }

    pub async fn delete_conversation(&self, id: Snowflake) -> ClientResult<()> {
        self.forget(id);
        let response = self
            .send_empty(Method::DELETE, &["conversations", &id.to_string()])
            .await?;
        Self::expect_empty(response).await
    }

    pub async fn add_participant(&self, id: Snowflake, user_id: Snowflake) -> ClientResult<Conversation> {
        let conversation: Conversation = self
            .send_json(
                Method::POST,
                &["conversations", &id.to_string(), "add-participant"],
                &json!({ "user_id": user_id }),
            )
            .await?;
        self.remember(&conversation);
        Ok(conversation)
    }

    /// Add several users one after another, reporting progress
    pub async fn add_participants(
        &self,
        id: Snowflake,
        user_ids: &[Snowflake],
        progress: &watch::Sender<BulkProgress>,
    ) -> Vec<ClientResult<Conversation>> {
        run_sequential(user_ids.iter().copied(), progress, |user_id| {
            self.add_participant(id, user_id)
        })
        .await
    }

    pub async fn remove_participant(
        &self,
        id: Snowflake,
        user_id: Snowflake,
    ) -> ClientResult<Conversation> {
        let conversation: Conversation = self
            .send_json(
                Method::POST,
                &["conversations", &id.to_string(), "remove-participant"],
                &json!({ "user_id": user_id }),
            )
            .await?;
        self.remember(&conversation);
        Ok(conversation)
    }

    pub async fn mark_read(&self, id: Snowflake) -> ClientResult<()> {
        let response = self
            .send_empty(Method::POST, &["conversations", &id.to_string(), "read"])
            .await?;
        Self::expect_empty(response).await
    }

    // ========================================================================
    // Messages
    // ========================================================================

    pub async fn messages(&self, conversation_id: Snowflake, query: HistoryQuery) -> ClientResult<MessagePage> {
        let request = self
            .request(
                Method::GET,
                &["messaging", "conversations", &conversation_id.to_string(), "messages"],
            )?
            .query(&query);
        Self::decode(request.send().await?).await
    }

    /// REST send; the nonce makes a retried request store one message
    pub async fn send_message(
        &self,
        conversation_id: Snowflake,
        content: &str,
        nonce: Option<&str>,
    ) -> ClientResult<Message> {
        self.send_json(
            Method::POST,
            &["conversations", &conversation_id.to_string(), "messages"],
            &json!({ "content": content, "nonce": nonce }),
        )
        .await
    }

    pub async fn edit_message(
        &self,
        conversation_id: Snowflake,
        message_id: Snowflake,
        content: &str,
    ) -> ClientResult<Message> {
        self.send_json(
            Method::PATCH,
            &[
                "conversations",
                &conversation_id.to_string(),
                "messages",
                &message_id.to_string(),
            ],
            &json!({ "content": content }),
        )
        .await
    }

    pub async fn delete_message(&self, conversation_id: Snowflake, message_id: Snowflake) -> ClientResult<()> {
        let response = self
            .send_empty(
                Method::DELETE,
                &[
                    "conversations",
                    &conversation_id.to_string(),
                    "messages",
                    &message_id.to_string(),
                ],
            )
            .await?;
        Self::expect_empty(response).await
    }

    async fn reaction(
        &self,
        method: Method,
        conversation_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> ClientResult<Vec<Reaction>> {
        let response = self
            .send_empty(
                method,
                &[
                    "conversations",
                    &conversation_id.to_string(),
                    "messages",
                    &message_id.to_string(),
                    "reactions",
                    emoji,
                ],
            )
            .await?;
        Self::decode(response).await
    }

    pub async fn add_reaction(
        &self,
        conversation_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> ClientResult<Vec<Reaction>> {
        self.reaction(Method::PUT, conversation_id, message_id, emoji).await
    }

    pub async fn remove_reaction(
        &self,
        conversation_id: Snowflake,
        message_id: Snowflake,
        emoji: &str,
    ) -> ClientResult<Vec<Reaction>> {
        self.reaction(Method::DELETE, conversation_id, message_id, emoji).await
    }

    pub async fn set_pinned(
        &self,
        conversation_id: Snowflake,
        message_id: Snowflake,
        pinned: bool,
    ) -> ClientResult<Message> {
        let method = if pinned { Method::PUT } else { Method::DELETE };
        let response = self
            .send_empty(
                method,
                &[
                    "conversations",
                    &conversation_id.to_string(),
                    "messages",
                    &message_id.to_string(),
                    "pin",
                ],
            )
            .await?;
        Self::decode(response).await
    }

    pub async fn pins(&self, conversation_id: Snowflake) -> ClientResult<Vec<Message>> {
        self.get(&["conversations", &conversation_id.to_string(), "pins"]).await
    }

    // ========================================================================
    // Users & presence
    // ========================================================================

    pub async fn search_users(&self, search: Option<&str>, limit: Option<i64>) -> ClientResult<Vec<UserWithPresence>> {
        let mut request = self.request(Method::GET, &["messaging", "users"])?;
        if let Some(search) = search {
            request = request.query(&[("search", search)]);
        }
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }
        Self::decode(request.send().await?).await
    }

    pub async fn me(&self) -> ClientResult<CurrentUser> {
        self.get(&["users", "@me"]).await
    }

    pub async fn update_me(&self, display_name: Option<&str>, avatar: Option<&str>) -> ClientResult<CurrentUser> {
        self.send_json(
            Method::PATCH,
            &["users", "@me"],
            &json!({ "display_name": display_name, "avatar": avatar }),
        )
        .await
    }

    pub async fn status(&self) -> ClientResult<Presence> {
        self.get(&["users", "@me", "status"]).await
    }

    pub async fn update_status(
        &self,
        status: PresenceStatus,
        custom_status: Option<&str>,
    ) -> ClientResult<Presence> {
        self.send_json(
            Method::PATCH,
            &["users", "@me", "status"],
            &json!({ "status": status, "custom_status": custom_status }),
        )
        .await
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub async fn notifications(&self, unread_only: bool) -> ClientResult<NotificationList> {
        let request = self
            .request(Method::GET, &["messaging", "notifications"])?
            .query(&[("unread_only", unread_only)]);
        Self::decode(request.send().await?).await
    }

    pub async fn mark_notification_read(&self, id: Snowflake) -> ClientResult<Notification> {
        let response = self
            .send_empty(Method::PATCH, &["notifications", &id.to_string(), "read"])
            .await?;
        Self::decode(response).await
    }

    pub async fn mark_all_notifications_read(&self) -> ClientResult<MarkAllRead> {
        let response = self
            .send_empty(Method::PATCH, &["notifications", "read-all"])
            .await?;
        Self::decode(response).await
    }

    pub async fn delete_notification(&self, id: Snowflake) -> ClientResult<()> {
        let response = self
            .send_empty(Method::DELETE, &["notifications", &id.to_string()])
            .await?;
        Self::expect_empty(response).await
    }
}
