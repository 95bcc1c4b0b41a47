//! Test fixtures and data generators
//!
//! Names are random so runs against a shared database don't collide.

use anyhow::{anyhow, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::helpers::{assert_json, TestServer};

pub const PASSWORD: &str = "TestPass123!";

/// Short random suffix for usernames and emails
pub fn unique_suffix() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

/// Registration request
#[derive(Debug, Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl RegisterRequest {
    pub fn unique() -> Self {
        Self::named("user")
    }

    /// Unique user whose username starts with `prefix`
    pub fn named(prefix: &str) -> Self {
        let suffix = unique_suffix();
        Self {
            username: format!("{prefix}_{suffix}"),
            email: format!("{prefix}{suffix}@example.com"),
            password: PASSWORD.to_string(),
            display_name: None,
        }
    }
}

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl From<&RegisterRequest> for LoginRequest {
    fn from(req: &RegisterRequest) -> Self {
        Self {
            email: req.email.clone(),
            password: req.password.clone(),
        }
    }
}

/// Token pair returned by register, login and refresh
#[derive(Debug, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: Value,
}

/// Registered account
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub username: String,
    pub email: String,
    pub token: String,
    pub refresh_token: String,
}

pub async fn register_user(server: &TestServer, prefix: &str) -> Result<TestUser> {
    let req = RegisterRequest::named(prefix);
    let response = server.post("/api/v1/auth/register", &req).await?;
    let auth: AuthResponse = assert_json(response, StatusCode::CREATED).await?;

    Ok(TestUser {
        id: id_of(&auth.user)?,
        username: req.username,
        email: req.email,
        token: auth.access_token,
        refresh_token: auth.refresh_token,
    })
}

/// `id` field of a JSON object
pub fn id_of(value: &Value) -> Result<String> {
    value["id"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow!("missing id in {value}"))
}

/// 1:1 conversation between `owner` and `other`; returns its JSON
pub async fn create_direct(server: &TestServer, owner: &TestUser, other: &TestUser) -> Result<Value> {
    let response = server
        .post_auth(
            "/api/v1/messaging/conversations",
            &owner.token,
            &json!({ "participant_id": other.id }),
        )
        .await?;
    let status = response.status();
    if status != StatusCode::CREATED && status != StatusCode::OK {
        let body = response.text().await?;
        anyhow::bail!("create_direct failed with {status}: {body}");
    }
    Ok(response.json().await?)
}

/// Group owned by `owner` with `members`; returns its JSON
pub async fn create_group(
    server: &TestServer,
    owner: &TestUser,
    name: &str,
    members: &[&TestUser],
) -> Result<Value> {
    let ids: Vec<&str> = members.iter().map(|m| m.id.as_str()).collect();
    let response = server
        .post_auth(
            "/api/v1/messaging/conversations",
            &owner.token,
            &json!({ "name": name, "participant_ids": ids }),
        )
        .await?;
    assert_json(response, StatusCode::CREATED).await
}

/// Send over REST; returns the stored message
pub async fn send_message(
    server: &TestServer,
    user: &TestUser,
    conversation_id: &str,
    content: &str,
    nonce: Option<&str>,
) -> Result<Value> {
    let response = server
        .post_auth(
            &format!("/api/v1/messaging/conversations/{conversation_id}/messages"),
            &user.token,
            &json!({ "content": content, "nonce": nonce }),
        )
        .await?;
    assert_json(response, StatusCode::CREATED).await
}
