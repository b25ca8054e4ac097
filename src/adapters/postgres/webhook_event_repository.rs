//! PostgreSQL implementation of WebhookEventRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, WebhookEventId};
use crate::domain::webhook::{EventFilter, Platform, WebhookEvent};
use crate::ports::WebhookEventRepository;

/// Hard cap on rows returned by `list`.
const MAX_LIST_LIMIT: i64 = 10_000;

pub struct PostgresWebhookEventRepository {
    pool: PgPool,
}

impl PostgresWebhookEventRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct WebhookEventRow {
    id: Uuid,
    platform: String,
    event_type: String,
    transaction_id: String,
    user_email: String,
    product_id: String,
    raw_payload: serde_json::Value,
    processed: bool,
    processing_attempts: i32,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<WebhookEventRow> for WebhookEvent {
    type Error = DomainError;

    fn try_from(row: WebhookEventRow) -> Result<Self, Self::Error> {
        let platform: Platform = row.platform.parse().map_err(|_| {
            DomainError::database(format!("Invalid platform value: {}", row.platform))
        })?;

        Ok(WebhookEvent {
            id: WebhookEventId::from_uuid(row.id),
            platform,
            event_type: row.event_type,
            transaction_id: row.transaction_id,
            user_email: row.user_email,
            product_id: row.product_id,
            raw_payload: row.raw_payload,
            processed: row.processed,
            processing_attempts: row.processing_attempts.max(0) as u32,
            error_message: row.error_message,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

fn not_found(id: &WebhookEventId) -> DomainError {
    DomainError::new(
        ErrorCode::WebhookEventNotFound,
        format!("Webhook event {} not found", id),
    )
}

#[async_trait]
impl WebhookEventRepository for PostgresWebhookEventRepository {
    async fn insert(&self, event: &WebhookEvent) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO webhook_events (
                id, platform, event_type, transaction_id, user_email, product_id,
                raw_payload, processed, processing_attempts, error_message, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(event.platform.as_str())
        .bind(&event.event_type)
        .bind(&event.transaction_id)
        .bind(&event.user_email)
        .bind(&event.product_id)
        .bind(&event.raw_payload)
        .bind(event.processed)
        .bind(event.processing_attempts as i32)
        .bind(&event.error_message)
        .bind(event.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert webhook event: {}", e)))?;

        Ok(())
    }

    async fn find_by_id(&self, id: &WebhookEventId) -> Result<Option<WebhookEvent>, DomainError> {
        let row: Option<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT id, platform, event_type, transaction_id, user_email, product_id,
                   raw_payload, processed, processing_attempts, error_message, created_at
            FROM webhook_events
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find webhook event: {}", e)))?;

        row.map(WebhookEvent::try_from).transpose()
    }

    async fn mark_processed(&self, id: &WebhookEventId, attempts: u32) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET processed = TRUE, error_message = NULL, processing_attempts = $2
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .bind(attempts as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to mark event processed: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(not_found(id));
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        id: &WebhookEventId,
        error: &str,
        attempts: u32,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            r#"
            UPDATE webhook_events
            SET error_message = $2, processing_attempts = $3
            WHERE id = $1 AND processed = FALSE
            "#,
        )
        .bind(id.as_uuid())
        .bind(error)
        .bind(attempts as i32)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to record event failure: {}", e)))?;

        if result.rows_affected() == 0 {
            tracing::debug!(event_id = %id, "Failure not recorded; event missing or already processed");
        }
        Ok(())
    }

    async fn list(&self, filter: &EventFilter) -> Result<Vec<WebhookEvent>, DomainError> {
        let limit = filter
            .limit
            .map(|l| i64::from(l).min(MAX_LIST_LIMIT))
            .unwrap_or(MAX_LIST_LIMIT);

        let rows: Vec<WebhookEventRow> = sqlx::query_as(
            r#"
            SELECT id, platform, event_type, transaction_id, user_email, product_id,
                   raw_payload, processed, processing_attempts, error_message, created_at
            FROM webhook_events
            WHERE ($1::TEXT IS NULL OR platform = $1)
              AND ($2::BOOLEAN IS NULL OR processed = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(filter.platform.map(|p| p.as_str()))
        .bind(filter.processed)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to list webhook events: {}", e)))?;

        rows.into_iter().map(WebhookEvent::try_from).collect()
    }
}
