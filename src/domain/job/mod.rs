//! Job domain: the retryable unit of work behind every accepted webhook.

mod backoff;
#[allow(clippy::module_inception)]
mod job;
mod status;

pub use backoff::BackoffPolicy;
pub use job::{
    EnqueueOptions, RetryDecision, WebhookJob, CANCELLED_ERROR, DEFAULT_MAX_ATTEMPTS,
    LEASE_EXPIRED_ERROR,
};
pub use status::JobStatus;
