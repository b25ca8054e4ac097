//! Database-backed job queue.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` inside a conditional update, so
//! concurrent workers never receive the same row. Delayed jobs need no
//! promotion step: a row becomes claimable once `scheduled_at <= NOW()`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

use crate::domain::foundation::{JobId, Timestamp, ValidationError, WebhookEventId};
use crate::domain::job::{EnqueueOptions, JobStatus, WebhookJob};
use crate::ports::{JobQueue, QueueError, QueueStats};

const JOB_COLUMNS: &str = "id, webhook_event_id, status, attempts, max_attempts, scheduled_at, \
                           claimed_at, processed_at, error, created_at";

pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies `mutate` to the locked row and writes it back.
    async fn update<F>(&self, id: &JobId, mutate: F) -> Result<WebhookJob, QueueError>
    where
        F: FnOnce(&mut WebhookJob, Timestamp) -> Result<(), ValidationError> + Send,
    {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_jobs WHERE id = $1 FOR UPDATE",
            JOB_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(unavailable)?;

        let mut job = row
            .map(WebhookJob::try_from)
            .transpose()?
            .ok_or(QueueError::NotFound(*id))?;
        mutate(&mut job, Timestamp::now()).map_err(|e| QueueError::InvalidState(e.to_string()))?;

        sqlx::query(
            r#"
            UPDATE webhook_jobs
            SET status = $2, attempts = $3, max_attempts = $4, scheduled_at = $5,
                claimed_at = $6, processed_at = $7, error = $8
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.scheduled_at.as_datetime())
        .bind(job.claimed_at.map(|t| *t.as_datetime()))
        .bind(job.processed_at.map(|t| *t.as_datetime()))
        .bind(&job.error)
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;
        Ok(job)
    }
}

fn unavailable(e: sqlx::Error) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    webhook_event_id: Uuid,
    status: String,
    attempts: i32,
    max_attempts: i32,
    scheduled_at: DateTime<Utc>,
    claimed_at: Option<DateTime<Utc>>,
    processed_at: Option<DateTime<Utc>>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for WebhookJob {
    type Error = QueueError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let status: JobStatus = row
            .status
            .parse()
            .map_err(|_| QueueError::Corrupt(format!("Invalid job status: {}", row.status)))?;

        Ok(WebhookJob {
            id: JobId::from_uuid(row.id),
            webhook_event_id: WebhookEventId::from_uuid(row.webhook_event_id),
            status,
            attempts: row.attempts.max(0) as u32,
            max_attempts: row.max_attempts.max(1) as u32,
            scheduled_at: Timestamp::from_datetime(row.scheduled_at),
            claimed_at: row.claimed_at.map(Timestamp::from_datetime),
            processed_at: row.processed_at.map(Timestamp::from_datetime),
            error: row.error,
            created_at: Timestamp::from_datetime(row.created_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    pending: i64,
    processing: i64,
    completed: i64,
    failed: i64,
    delayed: i64,
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    fn backend(&self) -> &'static str {
        "database"
    }

    async fn enqueue(
        &self,
        event_id: WebhookEventId,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError> {
        let job = WebhookJob::new(event_id, options, Timestamp::now());

        sqlx::query(
            r#"
            INSERT INTO webhook_jobs (
                id, webhook_event_id, status, attempts, max_attempts, scheduled_at, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.webhook_event_id.as_uuid())
        .bind(job.status.as_str())
        .bind(job.attempts as i32)
        .bind(job.max_attempts as i32)
        .bind(job.scheduled_at.as_datetime())
        .bind(job.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(job.id)
    }

    async fn claim_next(&self) -> Result<Option<WebhookJob>, QueueError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            r#"
            UPDATE webhook_jobs
            SET status = 'processing', attempts = attempts + 1, claimed_at = NOW()
            WHERE id = (
                SELECT id FROM webhook_jobs
                WHERE status = 'pending' AND scheduled_at <= NOW()
                ORDER BY scheduled_at
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            AND status = 'pending'
            AND scheduled_at <= NOW()
            RETURNING {}
            "#,
            JOB_COLUMNS
        ))
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(WebhookJob::try_from).transpose()
    }

    async fn complete(&self, id: &JobId) -> Result<(), QueueError> {
        self.update(id, |job, now| job.complete(now)).await.map(|_| ())
    }

    async fn reschedule(&self, id: &JobId, delay: Duration, error: &str) -> Result<(), QueueError> {
        self.update(id, |job, now| job.reschedule(delay, error, now))
            .await
            .map(|_| ())
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        self.update(id, |job, now| job.fail(error, now)).await.map(|_| ())
    }

    async fn find(&self, id: &JobId) -> Result<Option<WebhookJob>, QueueError> {
        let row: Option<JobRow> = sqlx::query_as(&format!(
            "SELECT {} FROM webhook_jobs WHERE id = $1",
            JOB_COLUMNS
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;

        row.map(WebhookJob::try_from).transpose()
    }

    async fn requeue(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        self.update(id, |job, now| job.requeue(now)).await
    }

    async fn cancel(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        self.update(id, |job, now| job.cancel(now)).await
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        Ok(0)
    }

    async fn reclaim_stalled(&self, lease_ttl: Duration) -> Result<usize, QueueError> {
        let cutoff = Timestamp::now().minus(lease_ttl);
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT id FROM webhook_jobs
            WHERE status = 'processing' AND claimed_at <= $1
            "#,
        )
        .bind(cutoff.as_datetime())
        .fetch_all(&self.pool)
        .await
        .map_err(unavailable)?;

        let mut reclaimed = 0;
        for id in ids.into_iter().map(JobId::from_uuid) {
            let result = self
                .update(&id, |job, now| {
                    if !job.lease_expired(lease_ttl, now) {
                        return Err(ValidationError::invalid_format("lease", "still held"));
                    }
                    job.release_stalled(now)
                })
                .await;
            match result {
                Ok(job) => {
                    reclaimed += 1;
                    tracing::warn!(job_id = %id, status = %job.status, "Reclaimed stalled job");
                }
                Err(QueueError::NotFound(_)) | Err(QueueError::InvalidState(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(reclaimed)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                COUNT(*) FILTER (WHERE status = 'processing') AS processing,
                COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                COUNT(*) FILTER (WHERE status = 'failed') AS failed,
                COUNT(*) FILTER (WHERE status = 'pending' AND scheduled_at > NOW()) AS delayed
            FROM webhook_jobs
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(unavailable)?;

        Ok(QueueStats {
            pending: row.pending.max(0) as u64,
            processing: row.processing.max(0) as u64,
            completed: row.completed.max(0) as u64,
            failed: row.failed.max(0) as u64,
            delayed: row.delayed.max(0) as u64,
        })
    }
}
