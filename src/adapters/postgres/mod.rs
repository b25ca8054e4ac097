//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresWebhookEventRepository` - Audit store of verified deliveries
//! - `PostgresTransactionRepository` - Write-once purchases
//! - `PostgresJobQueue` - `SKIP LOCKED` job queue, used when Redis is not configured
//! - `PostgresUserDirectory` / `PostgresPlanEntitlements` - Account collaborators

mod accounts;
mod job_queue;
mod transaction_repository;
mod webhook_event_repository;

pub use accounts::{PostgresPlanEntitlements, PostgresUserDirectory};
pub use job_queue::PostgresJobQueue;
pub use transaction_repository::PostgresTransactionRepository;
pub use webhook_event_repository::PostgresWebhookEventRepository;
