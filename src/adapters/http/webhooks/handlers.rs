//! HTTP handler for the multi-provider intake endpoint.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::{ReceiveWebhookCommand, ReceiveWebhookHandler};
use crate::domain::webhook::WebhookError;

use super::dto::{WebhookAcceptedResponse, WebhookErrorResponse, WebhookQuery};
use super::platform_detection::{detect_platform, signature_for};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct WebhookAppState {
    pub receive: Arc<ReceiveWebhookHandler>,
}

impl WebhookAppState {
    pub fn new(receive: ReceiveWebhookHandler) -> Self {
        Self {
            receive: Arc::new(receive),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payment - Accept a delivery from any supported provider
pub async fn receive_payment_webhook(
    State(state): State<WebhookAppState>,
    Query(query): Query<WebhookQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAcceptedResponse>, WebhookApiError> {
    let platform = detect_platform(query.platform.as_deref(), &headers).map_err(|e| {
        tracing::warn!(query = ?query.platform, "Rejected webhook from unknown platform");
        e
    })?;

    let cmd = ReceiveWebhookCommand {
        platform,
        signature: signature_for(platform, &headers),
        body: body.to_vec(),
    };

    let result = state.receive.handle(cmd).await?;
    Ok(Json(WebhookAcceptedResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// Converts intake failures into `{success:false, message}` responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> Response {
        let status = self.0.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self.0, "Webhook intake failed");
            let body = WebhookErrorResponse::new("Internal server error");
            return (status, Json(body)).into_response();
        }

        if self.0.is_soft_skip() {
            let body = WebhookAcceptedResponse {
                success: true,
                message: self.0.to_string(),
                event_id: None,
                job_id: None,
                queued: false,
            };
            return (status, Json(body)).into_response();
        }

        (status, Json(WebhookErrorResponse::new(self.0.to_string()))).into_response()
    }
}
