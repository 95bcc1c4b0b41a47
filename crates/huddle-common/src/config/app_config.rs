//! Application configuration
//!
//! Loaded from environment variables (with `.env` support) or from a layered
//! config file whose values can be overridden by `HUDDLE__SECTION__KEY`
//! variables.

use serde::Deserialize;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSettings,
    #[serde(default = "default_api_server")]
    pub api: ServerConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub database: DatabaseConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub snowflake: SnowflakeConfig,
    #[serde(default)]
    pub chat: ChatConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            env: Environment::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "staging" => Ok(Self::Staging),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown environment '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// WebSocket gateway settings
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_gateway_port")]
    pub port: u16,
    /// Interval advertised in Hello; clients must heartbeat within it
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// How long a dropped session stays resumable
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
}

impl GatewayConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_gateway_port(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            session_timeout_secs: default_session_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Apply embedded migrations on startup
    #[serde(default)]
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    #[serde(default = "default_redis_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
    #[serde(default = "default_refresh_token_expiry")]
    pub refresh_token_expiry: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_requests_per_second(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SnowflakeConfig {
    #[serde(default)]
    pub worker_id: u16,
}

/// Messaging limits and timers
#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Typing indicators clear after this much silence
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_max_group_size")]
    pub max_group_size: usize,
    /// Presence entries expire unless refreshed by heartbeats
    #[serde(default = "default_presence_ttl_secs")]
    pub presence_ttl_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            typing_timeout_ms: default_typing_timeout_ms(),
            max_message_length: default_max_message_length(),
            max_group_size: default_max_group_size(),
            presence_ttl_secs: default_presence_ttl_secs(),
        }
    }
}

fn default_app_name() -> String {
    "huddle".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_gateway_port() -> u16 {
    8081
}

fn default_api_server() -> ServerConfig {
    ServerConfig {
        host: default_host(),
        port: default_api_port(),
    }
}

fn default_heartbeat_interval_ms() -> u64 {
    41_250
}

fn default_session_timeout_secs() -> u64 {
    120
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    2
}

fn default_redis_max_connections() -> u32 {
    16
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn default_refresh_token_expiry() -> i64 {
    604_800 // 7 days
}

fn default_requests_per_second() -> u32 {
    20
}

fn default_burst() -> u32 {
    60
}

fn default_typing_timeout_ms() -> u64 {
    3_000
}

fn default_max_message_length() -> usize {
    huddle_core::entities::DEFAULT_MAX_MESSAGE_LEN
}

fn default_max_group_size() -> usize {
    256
}

fn default_presence_ttl_secs() -> u64 {
    300
}

/// Read and parse an optional variable; present-but-unparseable is an error
fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
        Err(_) => Ok(None),
    }
}

fn required_var(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingVar(key))
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// `DATABASE_URL`, `REDIS_URL` and `JWT_SECRET` are required.
    pub fn from_env() -> Result<Self, ConfigError> {
        // .env is optional
        let _ = dotenvy::dotenv();

        let env_name = env::var("APP_ENV").unwrap_or_default();
        let app_env = if env_name.is_empty() {
            Environment::default()
        } else {
            env_name
                .parse()
                .map_err(|_| ConfigError::InvalidValue("APP_ENV", env_name.clone()))?
        };

        Ok(Self {
            app: AppSettings {
                name: env::var("APP_NAME").unwrap_or_else(|_| default_app_name()),
                env: app_env,
            },
            api: ServerConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| default_host()),
                port: parse_var("API_PORT")?.unwrap_or_else(default_api_port),
            },
            gateway: GatewayConfig {
                host: env::var("GATEWAY_HOST").unwrap_or_else(|_| default_host()),
                port: parse_var("GATEWAY_PORT")?.unwrap_or_else(default_gateway_port),
                heartbeat_interval_ms: parse_var("GATEWAY_HEARTBEAT_INTERVAL_MS")?
                    .unwrap_or_else(default_heartbeat_interval_ms),
                session_timeout_secs: parse_var("GATEWAY_SESSION_TIMEOUT_SECS")?
                    .unwrap_or_else(default_session_timeout_secs),
            },
            database: DatabaseConfig {
                url: required_var("DATABASE_URL")?,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parse_var("DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
                run_migrations: parse_var("DATABASE_RUN_MIGRATIONS")?.unwrap_or(false),
            },
            redis: RedisConfig {
                url: required_var("REDIS_URL")?,
                max_connections: parse_var("REDIS_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_redis_max_connections),
            },
            jwt: JwtConfig {
                secret: required_var("JWT_SECRET")?,
                access_token_expiry: parse_var("JWT_ACCESS_TOKEN_EXPIRY")?
                    .unwrap_or_else(default_access_token_expiry),
                refresh_token_expiry: parse_var("JWT_REFRESH_TOKEN_EXPIRY")?
                    .unwrap_or_else(default_refresh_token_expiry),
            },
            rate_limit: RateLimitConfig {
                requests_per_second: parse_var("RATE_LIMIT_REQUESTS_PER_SECOND")?
                    .unwrap_or_else(default_requests_per_second),
                burst: parse_var("RATE_LIMIT_BURST")?.unwrap_or_else(default_burst),
            },
            cors: CorsConfig {
                allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                    .ok()
                    .map(|s| {
                        s.split(',')
                            .map(str::trim)
                            .filter(|o| !o.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            snowflake: SnowflakeConfig {
                worker_id: parse_var("WORKER_ID")?.unwrap_or(0),
            },
            chat: ChatConfig {
                typing_timeout_ms: parse_var("CHAT_TYPING_TIMEOUT_MS")?
                    .unwrap_or_else(default_typing_timeout_ms),
                max_message_length: parse_var("CHAT_MAX_MESSAGE_LENGTH")?
                    .unwrap_or_else(default_max_message_length),
                max_group_size: parse_var("CHAT_MAX_GROUP_SIZE")?
                    .unwrap_or_else(default_max_group_size),
                presence_ttl_secs: parse_var("CHAT_PRESENCE_TTL_SECS")?
                    .unwrap_or_else(default_presence_ttl_secs),
            },
        })
    }

    /// Load a TOML/YAML/JSON file, then apply `HUDDLE__*` overrides
    /// (e.g. `HUDDLE__DATABASE__URL`)
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(
                config::Environment::with_prefix("HUDDLE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::File(e.to_string()))
    }

    /// `HUDDLE_CONFIG` selects a config file; otherwise plain env vars are used
    pub fn load() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        match env::var("HUDDLE_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim()),
            _ => Self::from_env(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),

    #[error("Failed to load config file: {0}")]
    File(String),
}
