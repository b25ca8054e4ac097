//! TransactionRepository port - write-once purchase records.
//!
//! The unique `(platform, transaction_id)` constraint is what makes the
//! processing pipeline idempotent across redeliveries and racing workers.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, TransactionRecordId};
use crate::domain::webhook::{IdempotencyKey, Transaction};

/// Result of attempting to save a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveResult {
    /// Record was inserted (first time seeing this purchase).
    Inserted,
    /// Another worker or delivery already recorded it.
    AlreadyExists,
}

#[async_trait]
pub trait TransactionRepository: Send + Sync {
    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Transaction>, DomainError>;

    /// Inserts with `ON CONFLICT DO NOTHING` semantics on the idempotency key.
    async fn insert(&self, transaction: &Transaction) -> Result<SaveResult, DomainError>;

    /// Flags the record once its plan upgrade has been applied.
    async fn mark_applied(&self, id: &TransactionRecordId) -> Result<(), DomainError>;

    /// Removes a record whose plan upgrade could not be applied, so the
    /// retry starts from a clean slate.
    async fn discard(&self, id: &TransactionRecordId) -> Result<(), DomainError>;
}
