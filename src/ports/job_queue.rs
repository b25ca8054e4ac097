//! JobQueue port - durable, exclusively-claimed work queue.
//!
//! Backends differ in mechanics (list + sorted set, or conditional row
//! update) but share one contract: a pending job is handed to at most one
//! caller of [`JobQueue::claim_next`].

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use crate::domain::foundation::{JobId, WebhookEventId};
use crate::domain::job::{EnqueueOptions, WebhookJob};
use crate::domain::webhook::WebhookError;

/// Counts of jobs per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    /// Pending jobs whose `scheduled_at` is still in the future.
    pub delayed: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueueError {
    #[error("queue backend unavailable: {0}")]
    Unavailable(String),

    #[error("job {0} not found")]
    NotFound(JobId),

    #[error("invalid job state: {0}")]
    InvalidState(String),

    #[error("corrupt job record: {0}")]
    Corrupt(String),
}

impl From<QueueError> for WebhookError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) | QueueError::InvalidState(_) => {
                WebhookError::JobSettled(err.to_string())
            }
            QueueError::Unavailable(_) | QueueError::Corrupt(_) => {
                WebhookError::QueueUnavailable(err.to_string())
            }
        }
    }
}

#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Durably records a pending job for `event_id`.
    async fn enqueue(
        &self,
        event_id: WebhookEventId,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError>;

    /// Atomically moves one due job to `processing`, spending an attempt.
    async fn claim_next(&self) -> Result<Option<WebhookJob>, QueueError>;

    async fn complete(&self, id: &JobId) -> Result<(), QueueError>;

    /// Returns a `processing` job to `pending` after `delay`.
    async fn reschedule(&self, id: &JobId, delay: Duration, error: &str) -> Result<(), QueueError>;

    /// Terminal failure.
    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError>;

    async fn find(&self, id: &JobId) -> Result<Option<WebhookJob>, QueueError>;

    /// Operator retry of a `failed` job.
    async fn requeue(&self, id: &JobId) -> Result<WebhookJob, QueueError>;

    /// Operator cancel of a `pending` or `processing` job.
    async fn cancel(&self, id: &JobId) -> Result<WebhookJob, QueueError>;

    /// Makes delayed jobs whose time has come claimable. Returns how many moved.
    async fn promote_due(&self) -> Result<usize, QueueError>;

    /// Recovers `processing` jobs whose lease is older than `lease_ttl`.
    async fn reclaim_stalled(&self, lease_ttl: Duration) -> Result<usize, QueueError>;

    async fn stats(&self) -> Result<QueueStats, QueueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_errors_surface_as_queue_unavailable() {
        let err: WebhookError = QueueError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, WebhookError::QueueUnavailable(ref m) if m.contains("refused")));
    }

    #[test]
    fn state_conflicts_are_not_retryable() {
        let err: WebhookError = QueueError::InvalidState("Cannot complete a failed job".into()).into();
        assert!(matches!(err, WebhookError::JobSettled(_)));
        assert!(!err.is_retryable());

        let err: WebhookError = QueueError::NotFound(JobId::new()).into();
        assert!(matches!(err, WebhookError::JobSettled(_)));
    }

    #[test]
    fn stats_serialize_with_status_names() {
        let stats = QueueStats {
            pending: 2,
            failed: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(stats).unwrap();
        assert_eq!(json["pending"], 2);
        assert_eq!(json["failed"], 1);
        assert_eq!(json["completed"], 0);
    }
}
