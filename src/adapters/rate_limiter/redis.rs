//! Redis-backed rate limiter shared by every intake instance.
//!
//! Fixed-window counter: INCR the key, set EXPIRE on the first hit, deny
//! once the count passes the limit.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use crate::domain::foundation::Timestamp;
use crate::ports::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitStatus, RateLimiter,
};

use super::config::RateLimitRules;

#[derive(Clone)]
pub struct RedisRateLimiter {
    conn: MultiplexedConnection,
    rules: RateLimitRules,
}

impl RedisRateLimiter {
    pub fn new(conn: MultiplexedConnection, rules: RateLimitRules) -> Self {
        Self { conn, rules }
    }

    async fn seconds_to_reset(
        conn: &mut MultiplexedConnection,
        redis_key: &str,
        window_secs: u32,
    ) -> Result<u64, RateLimitError> {
        let ttl: i64 = conn.ttl(redis_key).await.map_err(unavailable)?;
        Ok(if ttl > 0 { ttl as u64 } else { window_secs as u64 })
    }
}

fn unavailable(e: redis::RedisError) -> RateLimitError {
    RateLimitError::Unavailable(e.to_string())
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let redis_key = key.to_redis_key();
        let rule = self.rules.rule_for(key.scope);
        let mut conn = self.conn.clone();

        let count: i64 = conn.incr(&redis_key, 1_i64).await.map_err(unavailable)?;
        if count == 1 {
            conn.expire::<_, ()>(&redis_key, rule.window_secs as i64)
                .await
                .map_err(unavailable)?;
        }

        let reset_secs = Self::seconds_to_reset(&mut conn, &redis_key, rule.window_secs).await?;

        if count > rule.limit as i64 {
            let retry_after = (reset_secs as u32).max(1);
            return Ok(RateLimitResult::Denied(RateLimitDenied {
                limit: rule.limit,
                retry_after_secs: retry_after,
                scope: key.scope,
                message: format!("Too many requests. Retry after {} seconds.", retry_after),
            }));
        }

        let now = Timestamp::now().as_unix_secs();
        Ok(RateLimitResult::Allowed(RateLimitStatus {
            limit: rule.limit,
            remaining: rule.limit.saturating_sub(count as u32),
            reset_at: Timestamp::from_unix_secs(now + reset_secs),
            window_secs: rule.window_secs,
        }))
    }
}

impl std::fmt::Debug for RedisRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisRateLimiter")
            .field("rules", &self.rules)
            .finish_non_exhaustive()
    }
}
