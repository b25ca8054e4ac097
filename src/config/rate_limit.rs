//! Intake rate limit configuration

use serde::Deserialize;

use crate::adapters::rate_limiter::{RateLimitRules, WindowRule};

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per client IP per window
    #[serde(default = "default_per_ip")]
    pub per_ip: u32,

    /// Requests across all clients per window
    #[serde(default = "default_global")]
    pub global: u32,

    #[serde(default = "default_window")]
    pub window_secs: u32,

    /// Keep counters in Redis so every instance shares them
    #[serde(default)]
    pub shared: bool,
}

impl RateLimitConfig {
    pub fn rules(&self) -> RateLimitRules {
        RateLimitRules {
            global: WindowRule::new(self.global, self.window_secs),
            per_ip: WindowRule::new(self.per_ip, self.window_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.per_ip == 0 || self.global == 0 || self.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_ip: default_per_ip(),
            global: default_global(),
            window_secs: default_window(),
            shared: false,
        }
    }
}

fn default_per_ip() -> u32 {
    10
}

fn default_global() -> u32 {
    10_000
}

fn default_window() -> u32 {
    60
}
