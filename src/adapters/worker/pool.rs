//! WorkerPool - Background service that drains the job queue.
//!
//! Three timers share one loop:
//!
//! | Timer | Default | Work |
//! |-------|---------|------|
//! | `promote_interval` | 1s | move due delayed jobs to the ready list |
//! | `poll_interval` | 1s | claim up to `max_concurrent_jobs` and run the pipeline |
//! | `sweep_interval` | 30s | recover `processing` jobs whose lease expired |
//!
//! ## Graceful Shutdown
//!
//! On the shutdown signal the pool stops claiming and waits for in-flight
//! jobs to finish before returning.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tokio::time;

use crate::application::handlers::{JobOutcome, ProcessWebhookJobHandler};
use crate::ports::JobQueue;

/// Configuration for the WorkerPool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// How often to claim ready jobs.
    pub poll_interval: Duration,

    /// How often to promote delayed jobs.
    pub promote_interval: Duration,

    /// How often to look for stalled leases.
    pub sweep_interval: Duration,

    /// Maximum jobs running at once.
    pub max_concurrent_jobs: usize,

    /// Age after which a `processing` job is presumed abandoned.
    pub lease_ttl: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            promote_interval: Duration::from_secs(1),
            sweep_interval: Duration::from_secs(30),
            max_concurrent_jobs: 5,
            lease_ttl: Duration::from_secs(300),
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_promote_interval(mut self, interval: Duration) -> Self {
        self.promote_interval = interval;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_max_concurrent_jobs(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max.max(1);
        self
    }

    pub fn with_lease_ttl(mut self, ttl: Duration) -> Self {
        self.lease_ttl = ttl;
        self
    }
}

pub struct WorkerPool {
    queue: Arc<dyn JobQueue>,
    handler: Arc<ProcessWebhookJobHandler>,
    config: WorkerPoolConfig,
    permits: Arc<Semaphore>,
    worker_id: String,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn JobQueue>,
        handler: Arc<ProcessWebhookJobHandler>,
        config: WorkerPoolConfig,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            queue,
            handler,
            config,
            permits,
            worker_id: format!("worker-{}", &uuid::Uuid::new_v4().to_string()[..8]),
        }
    }

    /// Run the pool until the shutdown signal is received.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut poll = time::interval(self.config.poll_interval);
        let mut promote = time::interval(self.config.promote_interval);
        let mut sweep = time::interval(self.config.sweep_interval);
        for timer in [&mut poll, &mut promote, &mut sweep] {
            timer.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        }
        let mut in_flight = JoinSet::new();

        tracing::info!(
            worker_id = %self.worker_id,
            backend = self.queue.backend(),
            max_concurrent_jobs = self.config.max_concurrent_jobs,
            "Worker pool started"
        );

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }

                _ = promote.tick() => {
                    self.promote().await;
                }

                _ = poll.tick() => {
                    self.dispatch(&mut in_flight).await;
                }

                _ = sweep.tick() => {
                    self.sweep().await;
                }

                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        tracing::info!(
            worker_id = %self.worker_id,
            in_flight = in_flight.len(),
            "Worker pool draining"
        );
        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::info!(worker_id = %self.worker_id, "Worker pool stopped");
    }

    /// Promote, claim, and wait for every claimed job to finish.
    ///
    /// Returns the outcomes of the jobs run in this cycle.
    pub async fn poll_once(&self) -> Vec<JobOutcome> {
        self.promote().await;
        let mut in_flight = JoinSet::new();
        self.dispatch(&mut in_flight).await;

        let mut outcomes = Vec::new();
        while let Some(joined) = in_flight.join_next().await {
            if let Ok(Some(outcome)) = joined {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// One stalled-lease sweep. Returns how many jobs were recovered.
    pub async fn sweep(&self) -> usize {
        match self.queue.reclaim_stalled(self.config.lease_ttl).await {
            Ok(0) => 0,
            Ok(n) => {
                tracing::warn!(worker_id = %self.worker_id, reclaimed = n, "Recovered stalled jobs");
                n
            }
            Err(e) => {
                tracing::error!(worker_id = %self.worker_id, error = %e, "Stalled job sweep failed");
                0
            }
        }
    }

    async fn promote(&self) {
        match self.queue.promote_due().await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(worker_id = %self.worker_id, promoted = n, "Promoted delayed jobs"),
            Err(e) => tracing::error!(worker_id = %self.worker_id, error = %e, "Failed to promote delayed jobs"),
        }
    }

    /// Claims jobs while permits remain and spawns the pipeline for each.
    async fn dispatch(&self, in_flight: &mut JoinSet<Option<JobOutcome>>) {
        loop {
            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                return;
            };

            let job = match self.queue.claim_next().await {
                Ok(Some(job)) => job,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(worker_id = %self.worker_id, error = %e, "Failed to claim job");
                    return;
                }
            };

            tracing::info!(
                worker_id = %self.worker_id,
                job_id = %job.id,
                event_id = %job.webhook_event_id,
                attempt = job.attempts,
                "Processing job"
            );

            let handler = self.handler.clone();
            let worker_id = self.worker_id.clone();
            in_flight.spawn(async move {
                let _permit = permit;
                match handler.handle(&job).await {
                    Ok(outcome) => Some(outcome),
                    Err(e) => {
                        tracing::error!(
                            worker_id = %worker_id,
                            job_id = %job.id,
                            error = %e,
                            "Failed to settle job; lease sweeper will recover it"
                        );
                        None
                    }
                }
            });
        }
    }
}

fn log_join(joined: Result<Option<JobOutcome>, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Job task panicked");
    }
}
