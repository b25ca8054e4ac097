//! Rate limit rules applied by the limiter adapters.

use serde::{Deserialize, Serialize};

use crate::ports::RateLimitScope;

/// A fixed window: at most `limit` requests every `window_secs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRule {
    pub limit: u32,
    pub window_secs: u32,
}

impl WindowRule {
    pub fn new(limit: u32, window_secs: u32) -> Self {
        Self {
            limit,
            window_secs: window_secs.max(1),
        }
    }
}

/// Rules per scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRules {
    /// Infrastructure protection across all callers.
    pub global: WindowRule,
    /// Per client IP on the intake endpoint.
    pub per_ip: WindowRule,
}

impl RateLimitRules {
    pub fn per_ip(limit: u32, window_secs: u32) -> Self {
        Self {
            per_ip: WindowRule::new(limit, window_secs),
            ..Self::default()
        }
    }

    pub fn rule_for(&self, scope: RateLimitScope) -> WindowRule {
        match scope {
            RateLimitScope::Global => self.global,
            RateLimitScope::Ip => self.per_ip,
        }
    }
}

impl Default for RateLimitRules {
    fn default() -> Self {
        Self {
            global: WindowRule::new(10_000, 60),
            per_ip: WindowRule::new(10, 60),
        }
    }
}
