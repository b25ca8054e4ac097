//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Pool min_connections exceeds max_connections")]
    InvalidPoolSize,

    #[error("Pool size exceeds maximum allowed (100)")]
    PoolSizeTooLarge,

    #[error("Invalid product map: {0}")]
    InvalidProductMap(String),

    #[error("Invalid backoff schedule: {0}")]
    InvalidBackoff(String),

    #[error("Worker count must be between 1 and 64")]
    InvalidWorkerCount,

    #[error("max_attempts must be at least 1")]
    InvalidMaxAttempts,

    #[error("Rate limit and window must both be positive")]
    InvalidRateLimit,

    #[error("Notification endpoint must be an http(s) URL")]
    InvalidNotificationEndpoint,

    #[error("Admin token must be at least {0} characters")]
    AdminTokenTooShort(usize),
}
