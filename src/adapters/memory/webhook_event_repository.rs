//! In-memory webhook event store.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, WebhookEventId};
use crate::domain::webhook::{EventFilter, WebhookEvent};
use crate::ports::WebhookEventRepository;

#[derive(Debug, Clone, Default)]
pub struct InMemoryWebhookEventRepository {
    events: Arc<RwLock<HashMap<WebhookEventId, WebhookEvent>>>,
}

impl InMemoryWebhookEventRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.events.read().await.len()
    }

    fn not_found(id: &WebhookEventId) -> DomainError {
        DomainError::new(
            ErrorCode::WebhookEventNotFound,
            format!("Webhook event not found: {}", id),
        )
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryWebhookEventRepository {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), DomainError> {
        self.events.write().await.insert(event.id, event.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn mark_processed(&self, id: &WebhookEventId, attempts: u32) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        event.processed = true;
        event.processing_attempts = attempts;
        event.error_message = None;
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &WebhookEventId,
        error: &str,
        attempts: u32,
    ) -> Result<(), DomainError> {
        let mut events = self.events.write().await;
        let event = events.get_mut(id).ok_or_else(|| Self::not_found(id))?;
        event.processing_attempts = attempts;
        event.error_message = Some(error.to_string());
        Ok(())
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<WebhookEvent>, DomainError> {
        let events = self.events.read().await;
        let mut matching: Vec<WebhookEvent> = events
            .values()
            .filter(|e| filter.platform.map_or(true, |p| e.platform == p))
            .filter(|e| filter.processed.map_or(true, |p| e.processed == p))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = filter.limit {
            matching.truncate(limit as usize);
        }
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::webhook::{CanonicalEvent, Platform};
    use serde_json::json;

    fn event(platform: Platform, tx: &str) -> WebhookEvent {
        WebhookEvent::received(
            platform,
            CanonicalEvent {
                event_type: "purchase".into(),
                transaction_id: tx.into(),
                user_email: "a@b.co".into(),
                product_id: "p".into(),
                status: "paid".into(),
            },
            json!({}),
        )
    }

    #[tokio::test]
    async fn duplicate_transaction_rows_are_kept_for_audit() {
        let repo = InMemoryWebhookEventRepository::new();
        repo.insert(&event(Platform::Hotmart, "HM-1")).await.unwrap();
        repo.insert(&event(Platform::Hotmart, "HM-1")).await.unwrap();
        assert_eq!(repo.count().await, 2);
    }

    #[tokio::test]
    async fn failure_then_success_updates_flags() {
        let repo = InMemoryWebhookEventRepository::new();
        let e = event(Platform::Eduzz, "1");
        repo.insert(&e).await.unwrap();

        repo.record_failure(&e.id, "User not found", 1).await.unwrap();
        let stored = repo.find_by_id(&e.id).await.unwrap().unwrap();
        assert!(!stored.processed);
        assert_eq!(stored.processing_attempts, 1);
        assert_eq!(stored.error_message.as_deref(), Some("User not found"));

        repo.mark_processed(&e.id, 2).await.unwrap();
        let stored = repo.find_by_id(&e.id).await.unwrap().unwrap();
        assert!(stored.processed);
        assert_eq!(stored.processing_attempts, 2);
        assert!(stored.error_message.is_none());
    }

    #[tokio::test]
    async fn mark_processed_on_missing_event_is_not_found() {
        let repo = InMemoryWebhookEventRepository::new();
        let err = repo.mark_processed(&WebhookEventId::new(), 1).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::WebhookEventNotFound);
    }

    #[tokio::test]
    async fn list_filters_and_limits() {
        let repo = InMemoryWebhookEventRepository::new();
        for i in 0..3 {
            repo.insert(&event(Platform::Stripe, &format!("pi_{i}"))).await.unwrap();
        }
        repo.insert(&event(Platform::Kirvano, "KV-1")).await.unwrap();

        let filter = EventFilter {
            platform: Some(Platform::Stripe),
            limit: Some(2),
            ..Default::default()
        };
        let listed = repo.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|e| e.platform == Platform::Stripe));
    }
}
