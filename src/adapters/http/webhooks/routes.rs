//! Axum router for the intake endpoint.

use axum::{routing::post, Router};

use super::handlers::{receive_payment_webhook, WebhookAppState};

/// Create the webhook intake router.
///
/// # Routes
/// - `POST /payment` - every provider, platform resolved per request
///
/// Other methods on the route answer 405.
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/payment", post(receive_payment_webhook))
}
