//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum intake and operator endpoints
//! - `postgres` - Event store, transactions, accounts, fallback queue
//! - `queue` - Redis and in-memory job queues
//! - `rate_limiter` - Per-IP request limits
//! - `notify` - Upgrade notices
//! - `worker` - Background job processing
//! - `memory` - In-memory stores for tests and local runs

pub mod http;
pub mod memory;
pub mod notify;
pub mod postgres;
pub mod queue;
pub mod rate_limiter;
pub mod worker;
