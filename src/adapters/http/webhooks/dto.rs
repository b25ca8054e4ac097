//! HTTP DTOs for the intake endpoint.

use serde::{Deserialize, Serialize};

use crate::application::handlers::ReceiveWebhookResult;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of `POST /webhooks/payment`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookQuery {
    #[serde(default)]
    pub platform: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Body returned on a 200.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookAcceptedResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub queued: bool,
}

impl From<ReceiveWebhookResult> for WebhookAcceptedResponse {
    fn from(result: ReceiveWebhookResult) -> Self {
        let message = result.message();
        match result {
            ReceiveWebhookResult::Queued { event_id, job_id } => Self {
                success: true,
                message,
                event_id: Some(event_id.to_string()),
                job_id: Some(job_id.to_string()),
                queued: true,
            },
            ReceiveWebhookResult::Ignored { .. } => Self {
                success: true,
                message,
                event_id: None,
                job_id: None,
                queued: false,
            },
        }
    }
}

/// Body returned on any non-2xx from the intake endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookErrorResponse {
    pub success: bool,
    pub message: String,
}

impl WebhookErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}
