//! In-memory rate limiter.
//!
//! Fixed-window counters in a HashMap. State is local to the process, so
//! several instances each enforce their own limit.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitRules;

/// Window count above which expired entries are swept on the next check.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone)]
pub struct InMemoryRateLimiter {
    rules: RateLimitRules,
    windows: Arc<RwLock<HashMap<String, WindowState>>>,
}

/// State for a single rate limit window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: u64,
    window_secs: u32,
}

impl WindowState {
    fn window_end(&self) -> u64 {
        self.window_start + self.window_secs as u64
    }
}

impl InMemoryRateLimiter {
    pub fn new(rules: RateLimitRules) -> Self {
        Self {
            rules,
            windows: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RateLimitRules::default())
    }

    #[cfg(test)]
    async fn tracked_keys(&self) -> usize {
        self.windows.read().await.len()
    }

    pub(crate) async fn check_at(&self, key: RateLimitKey, now: u64) -> RateLimitResult {
        let rule = self.rules.rule_for(key.scope);
        let mut windows = self.windows.write().await;

        if windows.len() > PRUNE_THRESHOLD {
            windows.retain(|_, state| now < state.window_end());
        }

        let state = windows
            .entry(key.to_redis_key())
            .or_insert_with(|| WindowState {
                count: 0,
                window_start: now,
                window_secs: rule.window_secs,
            });

        if now >= state.window_end() {
            state.count = 0;
            state.window_start = now;
        }

        if state.count >= rule.limit {
            let retry_after = state.window_end().saturating_sub(now) as u32;
            return RateLimitResult::Denied(RateLimitDenied {
                limit: rule.limit,
                retry_after_secs: retry_after.max(1),
                scope: key.scope,
                message: format!("Too many requests. Retry after {} seconds.", retry_after.max(1)),
            });
        }

        state.count += 1;
        RateLimitResult::Allowed(RateLimitStatus {
            limit: rule.limit,
            remaining: rule.limit.saturating_sub(state.count),
            reset_at: Timestamp::from_unix_secs(state.window_end()),
            window_secs: rule.window_secs,
        })
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        Ok(self.check_at(key, Timestamp::now().as_unix_secs()).await)
    }
}
