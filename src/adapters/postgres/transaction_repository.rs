//! PostgreSQL implementation of TransactionRepository.
//!
//! The `(platform, transaction_id)` unique constraint is the idempotency
//! anchor; a conflicting insert reports `AlreadyExists` instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, Timestamp, TransactionRecordId, UserId, WebhookEventId,
};
use crate::domain::webhook::{IdempotencyKey, Platform, PlanType, Transaction};
use crate::ports::{SaveResult, TransactionRepository};

pub struct PostgresTransactionRepository {
    pool: PgPool,
}

impl PostgresTransactionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TransactionRow {
    id: Uuid,
    user_id: Uuid,
    webhook_event_id: Uuid,
    upgrade_applied: bool,
    platform: String,
    transaction_id: String,
    product_id: String,
    plan_type: String,
    webhook_data: serde_json::Value,
    processed_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TransactionRow> for Transaction {
    type Error = DomainError;

    fn try_from(row: TransactionRow) -> Result<Self, Self::Error> {
        let platform: Platform = row.platform.parse().map_err(|_| {
            DomainError::database(format!("Invalid platform value: {}", row.platform))
        })?;
        let plan_type: PlanType = row.plan_type.parse().map_err(|_| {
            DomainError::database(format!("Invalid plan value: {}", row.plan_type))
        })?;

        Ok(Transaction {
            id: TransactionRecordId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            webhook_event_id: WebhookEventId::from_uuid(row.webhook_event_id),
            upgrade_applied: row.upgrade_applied,
            platform,
            transaction_id: row.transaction_id,
            product_id: row.product_id,
            plan_type,
            webhook_data: row.webhook_data,
            processed_at: Timestamp::from_datetime(row.processed_at),
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[async_trait]
impl TransactionRepository for PostgresTransactionRepository {
    async fn find_by_key(&self, key: &IdempotencyKey) -> Result<Option<Transaction>, DomainError> {
        let row: Option<TransactionRow> = sqlx::query_as(
            r#"
            SELECT id, user_id, webhook_event_id, upgrade_applied, platform,
                   transaction_id, product_id, plan_type, webhook_data,
                   processed_at, created_at
            FROM transactions
            WHERE platform = $1 AND transaction_id = $2
            "#,
        )
        .bind(key.platform.as_str())
        .bind(&key.transaction_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find transaction: {}", e)))?;

        row.map(Transaction::try_from).transpose()
    }

    async fn insert(&self, transaction: &Transaction) -> Result<SaveResult, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO transactions (
                id, user_id, webhook_event_id, upgrade_applied, platform,
                transaction_id, product_id, plan_type, webhook_data,
                processed_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT ON CONSTRAINT transactions_platform_transaction_id_key DO NOTHING
            "#,
        )
        .bind(transaction.id.as_uuid())
        .bind(transaction.user_id.as_uuid())
        .bind(transaction.webhook_event_id.as_uuid())
        .bind(transaction.upgrade_applied)
        .bind(transaction.platform.as_str())
        .bind(&transaction.transaction_id)
        .bind(&transaction.product_id)
        .bind(transaction.plan_type.as_str())
        .bind(&transaction.webhook_data)
        .bind(transaction.processed_at.as_datetime())
        .bind(transaction.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert transaction: {}", e)))?;

        Ok(if result.rows_affected() == 0 {
            SaveResult::AlreadyExists
        } else {
            SaveResult::Inserted
        })
    }

    async fn mark_applied(&self, id: &TransactionRecordId) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE transactions SET upgrade_applied = TRUE, processed_at = NOW() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark transaction applied: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::database(format!("Transaction {} not found", id)));
        }
        Ok(())
    }

    async fn discard(&self, id: &TransactionRecordId) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM transactions WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to discard transaction: {}", e)))?;
        Ok(())
    }
}
