//! Test helpers for integration tests
//!
//! Provides the [`TestServer`], request helpers and environment checks.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use huddle_common::AppConfig;
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// API and gateway running in-process against the configured stores
pub struct TestServer {
    pub api_addr: SocketAddr,
    pub gateway_addr: SocketAddr,
    pub client: Client,
    pub config: AppConfig,
    _api: JoinHandle<()>,
    _gateway: JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config()?).await
    }

    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let api_state = huddle_api::create_app_state(config.clone()).await?;
        let api_listener = TcpListener::bind("127.0.0.1:0").await?;
        let api_addr = api_listener.local_addr()?;
        let api_app = huddle_api::create_app(api_state);
        let api = tokio::spawn(async move {
            axum::serve(api_listener, api_app).await.ok();
        });

        // Distinct worker so both processes can mint ids concurrently
        let mut gateway_config = config.clone();
        gateway_config.snowflake.worker_id = config.snowflake.worker_id.wrapping_add(1) % 1024;
        let gateway_state = huddle_gateway::create_gateway_state(gateway_config).await?;
        let gateway_listener = TcpListener::bind("127.0.0.1:0").await?;
        let gateway_addr = gateway_listener.local_addr()?;
        let gateway_app = huddle_gateway::create_app(gateway_state);
        let gateway = tokio::spawn(async move {
            axum::serve(gateway_listener, gateway_app).await.ok();
        });

        // Let the pub/sub subscriber come up
        tokio::time::sleep(Duration::from_millis(200)).await;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            api_addr,
            gateway_addr,
            client,
            config,
            _api: api,
            _gateway: gateway,
        })
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.api_addr)
    }

    pub fn gateway_url(&self) -> String {
        format!("ws://{}/gateway", self.gateway_addr)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        Ok(self.client.get(self.url(path)).send().await?)
    }

    pub async fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<Response> {
        Ok(self.client.post(self.url(path)).json(body).send().await?)
    }

    /// Authenticated request without a body
    pub async fn send_auth(&self, method: Method, path: &str, token: &str) -> Result<Response> {
        Ok(self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .send()
            .await?)
    }

    /// Authenticated request with a JSON body
    pub async fn send_json<T: Serialize>(
        &self,
        method: Method,
        path: &str,
        token: &str,
        body: &T,
    ) -> Result<Response> {
        Ok(self
            .client
            .request(method, self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?)
    }

    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        self.send_auth(Method::GET, path, token).await
    }

    pub async fn post_auth<T: Serialize>(&self, path: &str, token: &str, body: &T) -> Result<Response> {
        self.send_json(Method::POST, path, token, body).await
    }

    pub async fn patch_auth<T: Serialize>(&self, path: &str, token: &str, body: &T) -> Result<Response> {
        self.send_json(Method::PATCH, path, token, body).await
    }

    pub async fn put_auth(&self, path: &str, token: &str) -> Result<Response> {
        self.send_auth(Method::PUT, path, token).await
    }

    pub async fn delete_auth(&self, path: &str, token: &str) -> Result<Response> {
        self.send_auth(Method::DELETE, path, token).await
    }
}

/// Configuration from the environment, with migrations on and a rate
/// limit high enough for a test burst
pub fn test_config() -> Result<AppConfig> {
    dotenvy::dotenv().ok();
    let mut config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {e}"))?;
    config.database.run_migrations = true;
    config.rate_limit.requests_per_second = config.rate_limit.requests_per_second.max(1000);
    config.rate_limit.burst = config.rate_limit.burst.max(1000);
    Ok(config)
}

/// Whether PostgreSQL and Redis are configured
pub async fn check_test_env() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("Skipping test: DATABASE_URL not set");
        return false;
    }

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }

    true
}

/// Assert response status and parse JSON body
pub async fn assert_json<T: DeserializeOwned>(response: Response, expected_status: StatusCode) -> Result<T> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

/// Assert an error response and return its `error.code`
pub async fn assert_error(response: Response, expected_status: StatusCode) -> Result<String> {
    let body: serde_json::Value = assert_json(response, expected_status).await?;
    body["error"]["code"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("error body without a code: {body}"))
}
