//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables carry the `PAYHOOK` prefix and
//! nested values use `__` as separator.
//!
//! # Example
//!
//! ```no_run
//! use payhook::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod admin;
mod database;
mod error;
mod notifications;
mod queue;
mod rate_limit;
mod redis;
mod server;
mod webhooks;

pub use admin::AdminConfig;
pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use notifications::NotificationsConfig;
pub use queue::QueueConfig;
pub use rate_limit::RateLimitConfig;
pub use redis::RedisConfig;
pub use server::{Environment, ServerConfig};
pub use webhooks::WebhooksConfig;

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    /// PostgreSQL (event store, transactions, fallback queue)
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Optional Redis (queue, shared rate limiting)
    #[serde(default)]
    pub redis: RedisConfig,

    #[serde(default)]
    pub webhooks: WebhooksConfig,

    #[serde(default)]
    pub queue: QueueConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (development)
    /// 2. Reads variables with the `PAYHOOK` prefix, `__` between levels
    /// 3. Fills gaps from conventional names (`DATABASE_URL`, `REDIS_URL`,
    ///    `{PROVIDER}_WEBHOOK_SECRET`)
    ///
    /// # Environment Variable Format
    ///
    /// - `PAYHOOK__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PAYHOOK__QUEUE__WORKERS=5` -> `queue.workers = 5`
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAYHOOK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config.with_env_fallbacks(|name| std::env::var(name).ok()))
    }

    /// Applies conventional, unprefixed variable names to unset values.
    pub fn with_env_fallbacks(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.database.url.is_empty() {
            if let Some(url) = lookup("DATABASE_URL") {
                self.database.url = url;
            }
        }
        if self.redis.url.is_none() {
            self.redis.url = lookup("REDIS_URL");
        }
        self.webhooks = self.webhooks.with_env_fallbacks(&lookup);
        self
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.redis.validate()?;
        self.webhooks.validate()?;
        self.queue.validate()?;
        self.rate_limit.validate()?;
        self.notifications.validate()?;
        self.admin.validate()?;
        Ok(())
    }

    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}
