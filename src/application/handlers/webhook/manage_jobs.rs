//! Operator actions on individual jobs.

use std::sync::Arc;

use crate::domain::foundation::JobId;
use crate::domain::job::WebhookJob;
use crate::ports::{JobQueue, QueueError, QueueStats};

pub struct ManageJobsHandler {
    queue: Arc<dyn JobQueue>,
}

impl ManageJobsHandler {
    pub fn new(queue: Arc<dyn JobQueue>) -> Self {
        Self { queue }
    }

    pub async fn get(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        self.queue.find(id).await?.ok_or(QueueError::NotFound(*id))
    }

    /// Puts a failed job back in line with a fresh attempt budget.
    pub async fn retry(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        let job = self.queue.requeue(id).await?;
        tracing::info!(job_id = %id, attempts = job.attempts, "Job requeued by operator");
        Ok(job)
    }

    /// Terminal; the job is never picked up again.
    pub async fn cancel(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        let job = self.queue.cancel(id).await?;
        tracing::info!(job_id = %id, "Job cancelled by operator");
        Ok(job)
    }

    pub fn backend(&self) -> &'static str {
        self.queue.backend()
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        self.queue.stats().await
    }
}
