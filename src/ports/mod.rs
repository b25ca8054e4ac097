//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Storage Ports
//!
//! - `WebhookEventRepository` - Audit store of verified deliveries
//! - `TransactionRepository` - Write-once purchases, the idempotency anchor
//! - `JobQueue` - Exclusively-claimed processing jobs
//!
//! ## Collaborator Ports
//!
//! - `UserDirectory` - Account lookup by email
//! - `PlanEntitlements` - Plan upgrade and usage reset
//! - `UpgradeNotifier` - Best-effort customer notification
//!
//! ## Edge Ports
//!
//! - `RateLimiter` - Fixed-window request counters

mod job_queue;
mod notifier;
mod plan_entitlements;
mod rate_limiter;
mod transaction_repository;
mod user_directory;
mod webhook_event_repository;

pub use job_queue::{JobQueue, QueueError, QueueStats};
pub use notifier::{NotifyError, UpgradeNotifier};
pub use plan_entitlements::{EntitlementError, PlanEntitlements, PlanGrant};
pub use rate_limiter::{
    RateLimitDenied, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope,
    RateLimitStatus, RateLimiter,
};
pub use transaction_repository::{SaveResult, TransactionRepository};
pub use user_directory::{UserAccount, UserDirectory};
pub use webhook_event_repository::WebhookEventRepository;
