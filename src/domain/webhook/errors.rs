//! Webhook error taxonomy.
//!
//! Intake errors surface as HTTP responses; pipeline errors are recorded on
//! the job and event rows and drive the retry policy.

use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::foundation::DomainError;

use super::platform::Platform;

/// Errors that occur while accepting or processing a webhook.
#[derive(Debug, Clone, Error)]
pub enum WebhookError {
    /// Platform could not be resolved from query, headers or User-Agent.
    #[error("Invalid or missing platform")]
    InvalidPlatform,

    /// The provider's signature header was absent or empty.
    #[error("Missing signature")]
    MissingSignature,

    #[error("Invalid signature")]
    SignatureVerificationFailed,

    /// Body was not valid JSON.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Verified, but not a completed purchase. Acknowledged without side effects.
    #[error("Event ignored: {0}")]
    IrrelevantEvent(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("No plan mapped for {platform} product '{product_id}'")]
    UnmappedProduct {
        platform: Platform,
        product_id: String,
    },

    /// A transaction with the same idempotency key already exists.
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    #[error("Plan upgrade failed: {0}")]
    PlanUpgradeFailed(String),

    /// Another delivery recorded this purchase and has not finished its upgrade.
    #[error("Upgrade in progress for {0}")]
    UpgradeInProgress(String),

    /// The job was cancelled or removed while it was being processed.
    #[error("Job no longer claimed: {0}")]
    JobSettled(String),

    #[error("Queue unavailable: {0}")]
    QueueUnavailable(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl WebhookError {
    /// Soft skips count as success for both the provider and the job.
    pub fn is_soft_skip(&self) -> bool {
        matches!(
            self,
            WebhookError::IrrelevantEvent(_) | WebhookError::DuplicateTransaction(_)
        )
    }

    /// Returns true if a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::UserNotFound(_) // account may be created after checkout
                | WebhookError::UnmappedProduct { .. }
                | WebhookError::PlanUpgradeFailed(_)
                | WebhookError::UpgradeInProgress(_)
                | WebhookError::QueueUnavailable(_)
                | WebhookError::Storage(_)
        )
    }

    /// Maps the error to the status returned to the provider.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidPlatform
            | WebhookError::MissingSignature
            | WebhookError::SignatureVerificationFailed
            | WebhookError::MalformedPayload(_) => StatusCode::BAD_REQUEST,

            WebhookError::IrrelevantEvent(_) | WebhookError::DuplicateTransaction(_) => {
                StatusCode::OK
            }

            WebhookError::UserNotFound(_)
            | WebhookError::UnmappedProduct { .. }
            | WebhookError::PlanUpgradeFailed(_)
            | WebhookError::UpgradeInProgress(_)
            | WebhookError::JobSettled(_)
            | WebhookError::QueueUnavailable(_)
            | WebhookError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DomainError> for WebhookError {
    fn from(err: DomainError) -> Self {
        WebhookError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::ErrorCode;

    // ══════════════════════════════════════════════════════════════
    // Display
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_platform_message_is_stable() {
        assert_eq!(
            WebhookError::InvalidPlatform.to_string(),
            "Invalid or missing platform"
        );
    }

    #[test]
    fn unmapped_product_names_platform_and_product() {
        let err = WebhookError::UnmappedProduct {
            platform: Platform::Eduzz,
            product_id: "999".to_string(),
        };
        assert_eq!(err.to_string(), "No plan mapped for eduzz product '999'");
    }

    // ══════════════════════════════════════════════════════════════
    // Status codes
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn intake_rejections_are_bad_request() {
        for err in [
            WebhookError::InvalidPlatform,
            WebhookError::MissingSignature,
            WebhookError::SignatureVerificationFailed,
            WebhookError::MalformedPayload("eof".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST, "{err}");
        }
    }

    #[test]
    fn soft_skips_are_acknowledged() {
        let err = WebhookError::IrrelevantEvent("refund".into());
        assert!(err.is_soft_skip());
        assert_eq!(err.status_code(), StatusCode::OK);
        assert!(!err.is_retryable());
    }

    #[test]
    fn queue_unavailable_fails_loudly() {
        let err = WebhookError::QueueUnavailable("redis down".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn in_flight_upgrade_is_retried_but_settled_job_is_not() {
        assert!(WebhookError::UpgradeInProgress("stripe:pi_1".into()).is_retryable());
        assert!(!WebhookError::JobSettled("cancelled".into()).is_retryable());
    }

    #[test]
    fn domain_error_becomes_storage() {
        let err: WebhookError = DomainError::new(ErrorCode::DatabaseError, "boom").into();
        assert!(matches!(err, WebhookError::Storage(ref m) if m.contains("boom")));
    }
}
