//! Rate limiter adapters.
//!
//! - `InMemoryRateLimiter` - per-process counters (default)
//! - `RedisRateLimiter` - counters shared across instances

mod config;
mod in_memory;
mod redis;

pub use config::{RateLimitRules, WindowRule};
pub use in_memory::InMemoryRateLimiter;
pub use self::redis::RedisRateLimiter;
