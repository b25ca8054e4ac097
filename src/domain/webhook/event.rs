//! Stored webhook deliveries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::{Timestamp, WebhookEventId};

use super::extractor::CanonicalEvent;
use super::platform::Platform;

/// One verified delivery, kept for audit.
///
/// Redeliveries produce additional rows with the same
/// `(platform, transaction_id)`; only the pipeline enforces uniqueness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: WebhookEventId,
    pub platform: Platform,
    pub event_type: String,
    pub transaction_id: String,
    pub user_email: String,
    pub product_id: String,
    pub raw_payload: Value,
    pub processed: bool,
    pub processing_attempts: u32,
    pub error_message: Option<String>,
    pub created_at: Timestamp,
}

impl WebhookEvent {
    /// Builds a fresh, unprocessed event from an extracted purchase.
    pub fn received(platform: Platform, canonical: CanonicalEvent, raw_payload: Value) -> Self {
        Self {
            id: WebhookEventId::new(),
            platform,
            event_type: canonical.event_type,
            transaction_id: canonical.transaction_id,
            user_email: canonical.user_email,
            product_id: canonical.product_id,
            raw_payload,
            processed: false,
            processing_attempts: 0,
            error_message: None,
            created_at: Timestamp::now(),
        }
    }

    /// Status label used in exports.
    pub fn status_label(&self) -> &'static str {
        if self.processed {
            "processed"
        } else if self.error_message.is_some() {
            "failed"
        } else {
            "pending"
        }
    }
}

/// Filter for listing events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub platform: Option<Platform>,
    pub processed: Option<bool>,
    pub limit: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canonical() -> CanonicalEvent {
        CanonicalEvent {
            event_type: "PURCHASE_COMPLETE".into(),
            transaction_id: "HM-1".into(),
            user_email: "a@b.co".into(),
            product_id: "HM-PRO".into(),
            status: "COMPLETED".into(),
        }
    }

    #[test]
    fn received_event_starts_unprocessed() {
        let event = WebhookEvent::received(Platform::Hotmart, canonical(), json!({"k": 1}));

        assert!(!event.processed);
        assert_eq!(event.processing_attempts, 0);
        assert!(event.error_message.is_none());
        assert_eq!(event.transaction_id, "HM-1");
        assert_eq!(event.status_label(), "pending");
    }

    #[test]
    fn status_label_reflects_outcome() {
        let mut event = WebhookEvent::received(Platform::Hotmart, canonical(), json!({}));
        event.error_message = Some("User not found".into());
        assert_eq!(event.status_label(), "failed");

        event.processed = true;
        assert_eq!(event.status_label(), "processed");
    }
}
