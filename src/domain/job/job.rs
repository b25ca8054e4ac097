//! The webhook job aggregate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::{JobId, StateMachine, Timestamp, ValidationError, WebhookEventId};

use super::backoff::BackoffPolicy;
use super::status::JobStatus;

/// Attempts granted to a fresh job (and to each operator requeue).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Error recorded when an operator cancels a job.
pub const CANCELLED_ERROR: &str = "cancelled";

/// Error recorded when a stalled job runs out of attempts.
pub const LEASE_EXPIRED_ERROR: &str = "lease expired";

/// Options for enqueueing a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueOptions {
    pub delay: Duration,
    pub max_attempts: u32,
}

impl Default for EnqueueOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl EnqueueOptions {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }
}

/// What to do with a job whose attempt just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// A unit of asynchronous work tied to one stored webhook event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookJob {
    pub id: JobId,
    pub webhook_event_id: WebhookEventId,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub scheduled_at: Timestamp,
    /// Start of the current lease; set while `processing`.
    pub claimed_at: Option<Timestamp>,
    pub processed_at: Option<Timestamp>,
    pub error: Option<String>,
    pub created_at: Timestamp,
}

impl WebhookJob {
    pub fn new(webhook_event_id: WebhookEventId, options: EnqueueOptions, now: Timestamp) -> Self {
        Self {
            id: JobId::new(),
            webhook_event_id,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: options.max_attempts.max(1),
            scheduled_at: now.plus(options.delay),
            claimed_at: None,
            processed_at: None,
            error: None,
            created_at: now,
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.status == JobStatus::Pending && !self.scheduled_at.is_after(&now)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Takes the lease and spends one attempt.
    pub fn claim(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(JobStatus::Processing)?;
        self.attempts += 1;
        self.claimed_at = Some(now);
        Ok(())
    }

    pub fn complete(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(JobStatus::Completed)?;
        self.claimed_at = None;
        self.processed_at = Some(now);
        self.error = None;
        Ok(())
    }

    /// Decides between another attempt and giving up after a failure.
    pub fn retry_decision(&self, policy: &BackoffPolicy) -> RetryDecision {
        if self.attempts_exhausted() {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: policy.delay_for(self.attempts),
            }
        }
    }

    /// Returns the job to `pending` after `delay`.
    pub fn reschedule(
        &mut self,
        delay: Duration,
        error: impl Into<String>,
        now: Timestamp,
    ) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(JobStatus::Pending)?;
        self.claimed_at = None;
        self.scheduled_at = now.plus(delay);
        self.error = Some(error.into());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>, now: Timestamp) -> Result<(), ValidationError> {
        self.status = self.status.transition_to(JobStatus::Failed)?;
        self.claimed_at = None;
        self.processed_at = Some(now);
        self.error = Some(error.into());
        Ok(())
    }

    /// Operator cancel: terminal, no further retries.
    pub fn cancel(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        self.fail(CANCELLED_ERROR, now)
    }

    /// Operator retry of a failed job.
    ///
    /// `attempts` is never reset; instead the budget is extended so the job
    /// gets `DEFAULT_MAX_ATTEMPTS` more tries.
    pub fn requeue(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        if self.status != JobStatus::Failed {
            return Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot requeue a {} job", self.status),
            ));
        }
        self.status = JobStatus::Pending;
        self.max_attempts = self.attempts + DEFAULT_MAX_ATTEMPTS;
        self.scheduled_at = now;
        self.claimed_at = None;
        self.processed_at = None;
        self.error = None;
        Ok(())
    }

    /// Whether the lease taken at `claimed_at` is older than `lease_ttl`.
    pub fn lease_expired(&self, lease_ttl: Duration, now: Timestamp) -> bool {
        self.status == JobStatus::Processing
            && self
                .claimed_at
                .map(|claimed| !claimed.plus(lease_ttl).is_after(&now))
                .unwrap_or(true)
    }

    /// Recovers a job whose worker disappeared mid-processing.
    pub fn release_stalled(&mut self, now: Timestamp) -> Result<(), ValidationError> {
        if self.attempts_exhausted() {
            self.fail(LEASE_EXPIRED_ERROR, now)
        } else {
            self.reschedule(Duration::ZERO, LEASE_EXPIRED_ERROR, now)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    fn new_job() -> WebhookJob {
        WebhookJob::new(WebhookEventId::new(), EnqueueOptions::default(), t0())
    }

    // ══════════════════════════════════════════════════════════════
    // Creation and claim
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn new_job_is_pending_and_due_immediately() {
        let job = new_job();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert!(job.is_due(t0()));
    }

    #[test]
    fn delayed_job_is_not_due_until_scheduled() {
        let job = WebhookJob::new(
            WebhookEventId::new(),
            EnqueueOptions::default().with_delay(secs(10)),
            t0(),
        );
        assert!(!job.is_due(t0().plus(secs(9))));
        assert!(job.is_due(t0().plus(secs(10))));
    }

    #[test]
    fn zero_max_attempts_is_raised_to_one() {
        let job = WebhookJob::new(
            WebhookEventId::new(),
            EnqueueOptions::default().with_max_attempts(0),
            t0(),
        );
        assert_eq!(job.max_attempts, 1);
    }

    #[test]
    fn claim_spends_an_attempt_and_starts_lease() {
        let mut job = new_job();
        job.claim(t0()).unwrap();

        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.claimed_at, Some(t0()));
        assert!(job.claim(t0()).is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Failure handling
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn failures_retry_with_backoff_until_exhausted() {
        let policy = BackoffPolicy::default();
        let mut job = new_job();
        let mut delays = Vec::new();

        loop {
            job.claim(t0()).unwrap();
            match job.retry_decision(&policy) {
                RetryDecision::Retry { delay } => {
                    delays.push(delay);
                    job.reschedule(delay, "boom", t0()).unwrap();
                }
                RetryDecision::GiveUp => {
                    job.fail("boom", t0()).unwrap();
                    break;
                }
            }
        }

        assert_eq!(delays, vec![secs(1), secs(5)]);
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.attempts, job.max_attempts);
        assert!(job.status.is_terminal());
    }

    #[test]
    fn reschedule_moves_scheduled_at_and_records_error() {
        let mut job = new_job();
        job.claim(t0()).unwrap();
        job.reschedule(secs(5), "User not found", t0()).unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.scheduled_at, t0().plus(secs(5)));
        assert_eq!(job.error.as_deref(), Some("User not found"));
        assert!(job.claimed_at.is_none());
    }

    #[test]
    fn complete_clears_error() {
        let mut job = new_job();
        job.claim(t0()).unwrap();
        job.reschedule(Duration::ZERO, "flaky", t0()).unwrap();
        job.claim(t0()).unwrap();
        job.complete(t0()).unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.error.is_none());
        assert_eq!(job.processed_at, Some(t0()));
    }

    // ══════════════════════════════════════════════════════════════
    // Operator actions
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn cancel_is_terminal_from_pending_or_processing() {
        let mut pending = new_job();
        pending.cancel(t0()).unwrap();
        assert_eq!(pending.status, JobStatus::Failed);
        assert_eq!(pending.error.as_deref(), Some(CANCELLED_ERROR));

        let mut processing = new_job();
        processing.claim(t0()).unwrap();
        processing.cancel(t0()).unwrap();
        assert_eq!(processing.status, JobStatus::Failed);

        let mut completed = new_job();
        completed.claim(t0()).unwrap();
        completed.complete(t0()).unwrap();
        assert!(completed.cancel(t0()).is_err());
    }

    #[test]
    fn requeue_resets_status_and_error_but_keeps_attempts() {
        let mut job = new_job();
        job.claim(t0()).unwrap();
        job.fail("boom", t0()).unwrap();

        job.requeue(t0().plus(secs(30))).unwrap();

        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.error.is_none());
        assert_eq!(job.attempts, 1);
        assert_eq!(job.max_attempts, 1 + DEFAULT_MAX_ATTEMPTS);
        assert!(job.is_due(t0().plus(secs(30))));
    }

    #[test]
    fn requeue_only_applies_to_failed_jobs() {
        let mut job = new_job();
        assert!(job.requeue(t0()).is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Leases
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn lease_expires_after_ttl() {
        let mut job = new_job();
        job.claim(t0()).unwrap();

        assert!(!job.lease_expired(secs(300), t0().plus(secs(299))));
        assert!(job.lease_expired(secs(300), t0().plus(secs(300))));
    }

    #[test]
    fn pending_jobs_have_no_lease() {
        assert!(!new_job().lease_expired(secs(0), t0().plus(secs(1000))));
    }

    #[test]
    fn release_stalled_retries_or_fails() {
        let mut job = WebhookJob::new(
            WebhookEventId::new(),
            EnqueueOptions::default().with_max_attempts(2),
            t0(),
        );
        job.claim(t0()).unwrap();
        job.release_stalled(t0()).unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        job.claim(t0()).unwrap();
        job.release_stalled(t0()).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.error.as_deref(), Some(LEASE_EXPIRED_ERROR));
    }
}
