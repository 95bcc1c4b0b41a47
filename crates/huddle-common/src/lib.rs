//! # huddle-common
//!
//! Configuration, the application error type, token and password handling,
//! and tracing setup shared by the API and gateway binaries.

pub mod auth;
pub mod config;
pub mod error;
pub mod telemetry;

pub use auth::{
    hash_password, validate_password_strength, verify_password, Claims, JwtService,
    PasswordService, TokenPair, TokenType,
};
pub use config::{
    AppConfig, AppSettings, ChatConfig, ConfigError, CorsConfig, DatabaseConfig, Environment,
    GatewayConfig, JwtConfig, RateLimitConfig, RedisConfig, ServerConfig, SnowflakeConfig,
};
pub use error::{AppError, AppResult, ErrorResponse};
pub use telemetry::{
    try_init_tracing, try_init_tracing_with_config, LogFormat, TracingConfig, TracingError,
};
