//! Configuration loading

mod app_config;

pub use app_config::{
    AppConfig, AppSettings, ChatConfig, ConfigError, CorsConfig, DatabaseConfig, Environment,
    GatewayConfig, JwtConfig, RateLimitConfig, RedisConfig, ServerConfig, SnowflakeConfig,
};
