//! ProcessWebhookJobHandler - Turns a claimed job into a plan upgrade.
//!
//! Pipeline per job:
//! 1. look up the buyer's account
//! 2. resolve product to plan
//! 3. short-circuit if the purchase was already applied
//! 4. record the purchase
//! 5. apply the plan upgrade and flag the purchase as applied
//! 6. mark the event processed
//! 7. complete the job
//! 8. notify the buyer (best effort)
//!
//! Failures in steps 1-7 are written to the event row and the job is
//! rescheduled with backoff, or failed once its attempts are spent. Step 3
//! makes every retry side-effect free.

use std::sync::Arc;

use crate::domain::job::{BackoffPolicy, RetryDecision, WebhookJob};
use crate::domain::webhook::{
    IdempotencyKey, PlanType, ProductCatalog, Transaction, WebhookError, WebhookEvent,
};
use crate::ports::{
    JobQueue, PlanEntitlements, SaveResult, TransactionRepository, UpgradeNotifier,
    UserDirectory, WebhookEventRepository,
};

/// What happened to a job after one pass through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Plan upgraded and buyer notified (or notification attempted).
    Completed { plan: PlanType },
    /// Nothing to do (already recorded or already processed); job completed.
    Skipped { reason: String },
    /// Attempt failed; job returned to the queue.
    Retrying {
        delay: std::time::Duration,
        error: String,
    },
    /// Attempt failed and no attempts remain.
    Failed { error: String },
}

/// Collaborators the pipeline needs.
#[derive(Clone)]
pub struct PipelinePorts {
    pub events: Arc<dyn WebhookEventRepository>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub users: Arc<dyn UserDirectory>,
    pub entitlements: Arc<dyn PlanEntitlements>,
    pub notifier: Arc<dyn UpgradeNotifier>,
    pub queue: Arc<dyn JobQueue>,
}

/// Successful pipeline run, before notification.
enum Upgrade {
    Applied { email: String, plan: PlanType },
    AlreadyRecorded(IdempotencyKey),
    AlreadyProcessed,
}

pub struct ProcessWebhookJobHandler {
    ports: PipelinePorts,
    catalog: ProductCatalog,
    backoff: BackoffPolicy,
}

impl ProcessWebhookJobHandler {
    pub fn new(ports: PipelinePorts, catalog: ProductCatalog, backoff: BackoffPolicy) -> Self {
        Self {
            ports,
            catalog,
            backoff,
        }
    }

    /// Runs the pipeline for a claimed job and settles it on the queue.
    ///
    /// Errors are only returned when the queue itself cannot be updated.
    pub async fn handle(&self, job: &WebhookJob) -> Result<JobOutcome, WebhookError> {
        let event = match self.ports.events.find_by_id(&job.webhook_event_id).await {
            Ok(Some(event)) => event,
            Ok(None) => {
                let error = format!("Webhook event {} not found", job.webhook_event_id);
                tracing::error!(job_id = %job.id, event_id = %job.webhook_event_id, "Job references a missing event");
                self.ports.queue.fail(&job.id, &error).await?;
                return Ok(JobOutcome::Failed { error });
            }
            Err(e) => return self.settle_failure(job, None, WebhookError::from(e)).await,
        };

        match self.run_pipeline(job, &event).await {
            Ok(upgrade) => self.settle_success(job, upgrade).await,
            Err(err) => self.settle_failure(job, Some(&event), err).await,
        }
    }

    /// Steps 1-7.
    async fn run_pipeline(
        &self,
        job: &WebhookJob,
        event: &WebhookEvent,
    ) -> Result<Upgrade, WebhookError> {
        if event.processed {
            self.complete_job(job).await?;
            return Ok(Upgrade::AlreadyProcessed);
        }

        // 1. Account
        let user = self
            .ports
            .users
            .find_by_email(&event.user_email)
            .await?
            .ok_or_else(|| WebhookError::UserNotFound(event.user_email.clone()))?;

        // 2. Plan
        let plan = self
            .catalog
            .resolve(event.platform, &event.product_id)
            .ok_or_else(|| WebhookError::UnmappedProduct {
                platform: event.platform,
                product_id: event.product_id.clone(),
            })?;

        // 3. Idempotency check. An unapplied row written by this event is
        // resumed; one written by another delivery is waited on.
        let key = IdempotencyKey::new(event.platform, event.transaction_id.clone());
        let transaction = match self.ports.transactions.find_by_key(&key).await? {
            Some(existing) if existing.upgrade_applied => {
                self.finish(job, event).await?;
                return Ok(Upgrade::AlreadyRecorded(key));
            }
            Some(existing) if existing.is_owned_by(&event.id) => existing,
            Some(_) => return Err(WebhookError::UpgradeInProgress(key.to_string())),
            None => {
                // 4. Record the purchase
                let transaction = Transaction::from_event(event, user.id, plan);
                if self.ports.transactions.insert(&transaction).await? == SaveResult::AlreadyExists {
                    return Err(WebhookError::UpgradeInProgress(key.to_string()));
                }
                transaction
            }
        };

        // 5. Upgrade; undo step 4 on failure so the retry redoes both
        if let Err(e) = self
            .ports
            .entitlements
            .apply_plan_upgrade(&user.id, transaction.plan_type)
            .await
        {
            if let Err(discard_err) = self.ports.transactions.discard(&transaction.id).await {
                tracing::error!(
                    job_id = %job.id,
                    transaction_id = %event.transaction_id,
                    error = %discard_err,
                    "Failed to discard transaction after upgrade failure"
                );
            }
            return Err(WebhookError::PlanUpgradeFailed(e.to_string()));
        }
        self.ports.transactions.mark_applied(&transaction.id).await?;

        // 6-7.
        self.finish(job, event).await?;

        Ok(Upgrade::Applied {
            email: event.user_email.clone(),
            plan: transaction.plan_type,
        })
    }

    async fn finish(&self, job: &WebhookJob, event: &WebhookEvent) -> Result<(), WebhookError> {
        self.ports.events.mark_processed(&event.id, job.attempts).await?;
        self.complete_job(job).await
    }

    /// Completes the job. A job cancelled mid-run keeps its cancelled state;
    /// the work already done stands.
    async fn complete_job(&self, job: &WebhookJob) -> Result<(), WebhookError> {
        match self.ports.queue.complete(&job.id).await.map_err(WebhookError::from) {
            Err(WebhookError::JobSettled(reason)) => {
                tracing::warn!(job_id = %job.id, reason = %reason, "Job settled elsewhere while processing; result kept");
                Ok(())
            }
            other => other,
        }
    }

    async fn settle_success(
        &self,
        job: &WebhookJob,
        upgrade: Upgrade,
    ) -> Result<JobOutcome, WebhookError> {
        match upgrade {
            Upgrade::Applied { email, plan } => {
                tracing::info!(job_id = %job.id, attempt = job.attempts, plan = %plan, "Plan upgrade applied");
                // 8. Best effort
                if let Err(e) = self.ports.notifier.notify_upgrade(&email, plan).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Upgrade notification failed");
                }
                Ok(JobOutcome::Completed { plan })
            }
            Upgrade::AlreadyRecorded(key) => {
                let reason = WebhookError::DuplicateTransaction(key.to_string()).to_string();
                tracing::info!(job_id = %job.id, idempotency_key = %key, "Duplicate transaction skipped");
                Ok(JobOutcome::Skipped { reason })
            }
            Upgrade::AlreadyProcessed => Ok(JobOutcome::Skipped {
                reason: "event already processed".to_string(),
            }),
        }
    }

    async fn settle_failure(
        &self,
        job: &WebhookJob,
        event: Option<&WebhookEvent>,
        err: WebhookError,
    ) -> Result<JobOutcome, WebhookError> {
        let error = err.to_string();

        if let Some(event) = event {
            if let Err(e) = self
                .ports
                .events
                .record_failure(&event.id, &error, job.attempts)
                .await
            {
                tracing::error!(job_id = %job.id, error = %e, "Failed to record event failure");
            }
        }

        let decision = if err.is_retryable() {
            job.retry_decision(&self.backoff)
        } else {
            RetryDecision::GiveUp
        };

        match decision {
            RetryDecision::Retry { delay } => {
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    delay_secs = delay.as_secs(),
                    error = %error,
                    "Webhook job failed; retrying"
                );
                match self.ports.queue.reschedule(&job.id, delay, &error).await {
                    Ok(()) => Ok(JobOutcome::Retrying { delay, error }),
                    Err(e) => self.settled_elsewhere(job, e.into(), error),
                }
            }
            RetryDecision::GiveUp => {
                tracing::error!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    error = %error,
                    "Webhook job failed permanently"
                );
                match self.ports.queue.fail(&job.id, &error).await {
                    Ok(()) => Ok(JobOutcome::Failed { error }),
                    Err(e) => self.settled_elsewhere(job, e.into(), error),
                }
            }
        }
    }

    /// A failed attempt on a job that was cancelled meanwhile ends as failed;
    /// queue outages still surface to the caller.
    fn settled_elsewhere(
        &self,
        job: &WebhookJob,
        err: WebhookError,
        error: String,
    ) -> Result<JobOutcome, WebhookError> {
        match err {
            WebhookError::JobSettled(reason) => {
                tracing::warn!(job_id = %job.id, reason = %reason, "Job settled elsewhere; failure not requeued");
                Ok(JobOutcome::Failed { error })
            }
            other => Err(other),
        }
    }
}
