//! Recorded purchases.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::domain::foundation::{Timestamp, TransactionRecordId, UserId, WebhookEventId};

use super::event::WebhookEvent;
use super::plan::PlanType;
use super::platform::Platform;

/// `(platform, transaction_id)`: at most one side effect per real purchase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey {
    pub platform: Platform,
    pub transaction_id: String,
}

impl IdempotencyKey {
    pub fn new(platform: Platform, transaction_id: impl Into<String>) -> Self {
        Self {
            platform,
            transaction_id: transaction_id.into(),
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.transaction_id)
    }
}

/// Write-once record of a purchase that upgraded an account.
///
/// The row is written before the upgrade and flagged once the upgrade lands.
/// Until then only the event that wrote it may finish the upgrade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionRecordId,
    pub user_id: UserId,
    /// Delivery whose job wrote this row.
    pub webhook_event_id: WebhookEventId,
    pub upgrade_applied: bool,
    pub platform: Platform,
    pub transaction_id: String,
    pub product_id: String,
    pub plan_type: PlanType,
    pub webhook_data: Value,
    pub processed_at: Timestamp,
    pub created_at: Timestamp,
}

impl Transaction {
    pub fn from_event(event: &WebhookEvent, user_id: UserId, plan_type: PlanType) -> Self {
        let now = Timestamp::now();
        Self {
            id: TransactionRecordId::new(),
            user_id,
            webhook_event_id: event.id,
            upgrade_applied: false,
            platform: event.platform,
            transaction_id: event.transaction_id.clone(),
            product_id: event.product_id.clone(),
            plan_type,
            webhook_data: event.raw_payload.clone(),
            processed_at: now,
            created_at: now,
        }
    }

    pub fn key(&self) -> IdempotencyKey {
        IdempotencyKey::new(self.platform, self.transaction_id.clone())
    }

    pub fn is_owned_by(&self, event_id: &WebhookEventId) -> bool {
        self.webhook_event_id == *event_id
    }
}
