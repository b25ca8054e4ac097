//! Job queue backends.
//!
//! - `InMemoryJobQueue` - process-local, for tests and development
//! - `RedisJobQueue` - list + sorted sets shared by every worker instance
//!
//! The database-backed queue lives with the other Postgres adapters.

mod in_memory;
mod redis;

pub use self::redis::RedisJobQueue;
pub use in_memory::InMemoryJobQueue;
