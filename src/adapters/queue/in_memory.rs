//! In-memory job queue.
//!
//! A ready `VecDeque` plus a delayed `BTreeMap` ordered by due time, the
//! process-local twin of the Redis list + sorted set. Suitable for tests and
//! single-process development; nothing survives a restart.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::foundation::{JobId, Timestamp, WebhookEventId};
use crate::domain::job::{EnqueueOptions, JobStatus, WebhookJob};
use crate::ports::{JobQueue, QueueError, QueueStats};

#[derive(Debug, Default)]
struct QueueState {
    jobs: HashMap<JobId, WebhookJob>,
    ready: VecDeque<JobId>,
    delayed: BTreeMap<Timestamp, Vec<JobId>>,
}

impl QueueState {
    fn job_mut(&mut self, id: &JobId) -> Result<&mut WebhookJob, QueueError> {
        self.jobs.get_mut(id).ok_or(QueueError::NotFound(*id))
    }

    /// Puts a pending job where `claim_next` or `promote_due` will find it.
    fn schedule(&mut self, id: JobId, scheduled_at: Timestamp, now: Timestamp) {
        if scheduled_at.is_after(&now) {
            self.delayed.entry(scheduled_at).or_default().push(id);
        } else {
            self.ready.push_back(id);
        }
    }

    fn forget(&mut self, id: &JobId) {
        self.ready.retain(|queued| queued != id);
        self.delayed.retain(|_, ids| {
            ids.retain(|queued| queued != id);
            !ids.is_empty()
        });
    }

    fn promote_due(&mut self, now: Timestamp) -> usize {
        let later = self.delayed.split_off(&now.plus(Duration::from_nanos(1)));
        let due = std::mem::replace(&mut self.delayed, later);
        let mut promoted = 0;
        for id in due.into_values().flatten() {
            self.ready.push_back(id);
            promoted += 1;
        }
        promoted
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryJobQueue {
    state: Arc<Mutex<QueueState>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn promote_due_at(&self, now: Timestamp) -> usize {
        self.state.lock().await.promote_due(now)
    }

    pub(crate) async fn reclaim_stalled_at(&self, lease_ttl: Duration, now: Timestamp) -> usize {
        let mut state = self.state.lock().await;
        let stalled: Vec<JobId> = state
            .jobs
            .values()
            .filter(|job| job.lease_expired(lease_ttl, now))
            .map(|job| job.id)
            .collect();

        let mut reclaimed = 0;
        for id in stalled {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.release_stalled(now).is_ok() {
                reclaimed += 1;
                if job.status == JobStatus::Pending {
                    let scheduled_at = job.scheduled_at;
                    state.schedule(id, scheduled_at, now);
                }
            }
        }
        reclaimed
    }
}

fn invalid(err: impl std::fmt::Display) -> QueueError {
    QueueError::InvalidState(err.to_string())
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn enqueue(
        &self,
        event_id: WebhookEventId,
        options: EnqueueOptions,
    ) -> Result<JobId, QueueError> {
        let now = Timestamp::now();
        let job = WebhookJob::new(event_id, options, now);
        let id = job.id;
        let mut state = self.state.lock().await;
        state.schedule(id, job.scheduled_at, now);
        state.jobs.insert(id, job);
        Ok(id)
    }

    async fn claim_next(&self) -> Result<Option<WebhookJob>, QueueError> {
        let now = Timestamp::now();
        let mut state = self.state.lock().await;
        while let Some(id) = state.ready.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else {
                continue;
            };
            if job.status != JobStatus::Pending {
                continue;
            }
            job.claim(now).map_err(invalid)?;
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn complete(&self, id: &JobId) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.job_mut(id)?.complete(Timestamp::now()).map_err(invalid)
    }

    async fn reschedule(&self, id: &JobId, delay: Duration, error: &str) -> Result<(), QueueError> {
        let now = Timestamp::now();
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        job.reschedule(delay, error, now).map_err(invalid)?;
        let scheduled_at = job.scheduled_at;
        state.schedule(*id, scheduled_at, now);
        Ok(())
    }

    async fn fail(&self, id: &JobId, error: &str) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        state.job_mut(id)?.fail(error, Timestamp::now()).map_err(invalid)
    }

    async fn find(&self, id: &JobId) -> Result<Option<WebhookJob>, QueueError> {
        Ok(self.state.lock().await.jobs.get(id).cloned())
    }

    async fn requeue(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        let now = Timestamp::now();
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        job.requeue(now).map_err(invalid)?;
        let job = job.clone();
        state.schedule(*id, job.scheduled_at, now);
        Ok(job)
    }

    async fn cancel(&self, id: &JobId) -> Result<WebhookJob, QueueError> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(id)?;
        job.cancel(Timestamp::now()).map_err(invalid)?;
        let job = job.clone();
        state.forget(id);
        Ok(job)
    }

    async fn promote_due(&self) -> Result<usize, QueueError> {
        Ok(self.promote_due_at(Timestamp::now()).await)
    }

    async fn reclaim_stalled(&self, lease_ttl: Duration) -> Result<usize, QueueError> {
        Ok(self.reclaim_stalled_at(lease_ttl, Timestamp::now()).await)
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let now = Timestamp::now();
        let state = self.state.lock().await;
        let mut stats = QueueStats::default();
        for job in state.jobs.values() {
            match job.status {
                JobStatus::Pending => {
                    stats.pending += 1;
                    if job.scheduled_at.is_after(&now) {
                        stats.delayed += 1;
                    }
                }
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}
