//! In-memory adapters for tests and single-process development.

mod collaborators;
mod transaction_repository;
mod webhook_event_repository;

pub use collaborators::{
    InMemoryPlanEntitlements, InMemoryUserDirectory, RecordingNotifier,
};
pub use transaction_repository::InMemoryTransactionRepository;
pub use webhook_event_repository::InMemoryWebhookEventRepository;
