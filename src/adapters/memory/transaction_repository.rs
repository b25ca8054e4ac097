//! In-memory transaction store keyed by idempotency key.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, TransactionRecordId};
use crate::domain::webhook::{IdempotencyKey, Transaction};
use crate::ports::{SaveResult, TransactionRepository};

#[derive(Debug, Clone, Default)]
pub struct InMemoryTransactionRepository {
    transactions: Arc<RwLock<HashMap<IdempotencyKey, Transaction>>>,
}

impl InMemoryTransactionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self) -> usize {
        self.transactions.read().await.len()
    }

    pub async fn all(&self) -> Vec<Transaction> {
        self.transactions.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl TransactionRepository for InMemoryTransactionRepository {
    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Transaction>, DomainError> {
        Ok(self.transactions.read().await.get(key).cloned())
    }

    async fn insert(&self, transaction: &Transaction) -> Result<SaveResult, DomainError> {
        let mut transactions = self.transactions.write().await;
        let key = transaction.key();
        if transactions.contains_key(&key) {
            return Ok(SaveResult::AlreadyExists);
        }
        transactions.insert(key, transaction.clone());
        Ok(SaveResult::Inserted)
    }

    async fn mark_applied(&self, id: &TransactionRecordId) -> Result<(), DomainError> {
        let mut transactions = self.transactions.write().await;
        let tx = transactions
            .values_mut()
            .find(|tx| tx.id == *id)
            .ok_or_else(|| DomainError::database(format!("Transaction {} not found", id)))?;
        tx.upgrade_applied = true;
        Ok(())
    }

    async fn discard(&self, id: &TransactionRecordId) -> Result<(), DomainError> {
        self.transactions.write().await.retain(|_, tx| tx.id != *id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;
    use crate::domain::webhook::{CanonicalEvent, PlanType, Platform, WebhookEvent};
    use serde_json::json;
    use uuid::Uuid;

    fn transaction(tx: &str) -> Transaction {
        let event = WebhookEvent::received(
            Platform::Hotmart,
            CanonicalEvent {
                event_type: "PURCHASE_COMPLETE".into(),
                transaction_id: tx.into(),
                user_email: "a@b.co".into(),
                product_id: "HM-PRO".into(),
                status: "COMPLETED".into(),
            },
            json!({}),
        );
        Transaction::from_event(&event, UserId::from_uuid(Uuid::new_v4()), PlanType::Pro)
    }

    #[tokio::test]
    async fn second_insert_with_same_key_is_rejected() {
        let repo = InMemoryTransactionRepository::new();
        assert_eq!(repo.insert(&transaction("HM-123")).await.unwrap(), SaveResult::Inserted);
        assert_eq!(
            repo.insert(&transaction("HM-123")).await.unwrap(),
            SaveResult::AlreadyExists
        );
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn mark_applied_flags_the_record() {
        let repo = InMemoryTransactionRepository::new();
        let tx = transaction("HM-9");
        repo.insert(&tx).await.unwrap();

        repo.mark_applied(&tx.id).await.unwrap();

        assert!(repo.find_by_key(&tx.key()).await.unwrap().unwrap().upgrade_applied);
        assert!(repo.mark_applied(&transaction("HM-10").id).await.is_err());
    }

    #[tokio::test]
    async fn discard_removes_only_that_record() {
        let repo = InMemoryTransactionRepository::new();
        let keep = transaction("HM-1");
        let drop = transaction("HM-2");
        repo.insert(&keep).await.unwrap();
        repo.insert(&drop).await.unwrap();

        repo.discard(&drop.id).await.unwrap();

        assert!(repo.find_by_key(&keep.key()).await.unwrap().is_some());
        assert!(repo.find_by_key(&drop.key()).await.unwrap().is_none());
    }
}
