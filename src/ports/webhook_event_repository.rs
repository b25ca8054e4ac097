//! WebhookEventRepository port - audit store for verified deliveries.
//!
//! Every accepted delivery is written here before its job is enqueued.
//! Rows are never deleted by the service; only `processed`,
//! `processing_attempts` and `error_message` change after insert.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, WebhookEventId};
use crate::domain::webhook::{EventFilter, WebhookEvent};

/// Port for persisting webhook events.
#[async_trait]
pub trait WebhookEventRepository: Send + Sync {
    /// Stores a new event. Duplicate `(platform, transaction_id)` rows are allowed.
    async fn insert(&self, event: &WebhookEvent) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError>;

    /// Flips `processed` and clears the last error.
    ///
    /// # Errors
    ///
    /// `WebhookEventNotFound` if no row matches.
    async fn mark_processed(&self, id: &WebhookEventId, attempts: u32) -> Result<(), DomainError>;

    /// Records a failed attempt, leaving `processed = false`.
    async fn record_failure(
        &self,
        id: &WebhookEventId,
        error: &str,
        attempts: u32,
    ) -> Result<(), DomainError>;

    /// Lists events newest first.
    async fn list(&self, filter: &EventFilter) -> Result<Vec<WebhookEvent>, DomainError>;
}
