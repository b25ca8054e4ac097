//! Top-level router: intake, operator endpoints and the shared layer stack.

use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::get,
    Json, Router,
};
use secrecy::Secret;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::admin::{admin_routes, AdminAppState};
use super::middleware::{
    admin_auth_middleware, rate_limit_middleware, AdminAuthState, RateLimiterState,
};
use super::webhooks::{webhook_routes, WebhookAppState};

/// Largest accepted delivery body.
pub const BODY_LIMIT_BYTES: usize = 1024 * 1024;

/// Everything the router needs, already constructed.
pub struct HttpServices {
    pub webhooks: WebhookAppState,
    pub admin: AdminAppState,
    pub rate_limiter: RateLimiterState,
    /// Operator routes are only mounted when set.
    pub admin_token: Option<Secret<String>>,
    pub request_timeout: Duration,
}

/// Assigns a fresh UUID to requests that arrive without `x-request-id`.
#[derive(Clone, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let request_id = uuid::Uuid::new_v4().to_string().parse().ok()?;
        Some(RequestId::new(request_id))
    }
}

pub fn build_router(services: HttpServices) -> Router {
    let webhooks = webhook_routes()
        .with_state(services.webhooks)
        .layer(middleware::from_fn_with_state(
            services.rate_limiter,
            rate_limit_middleware,
        ))
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES));

    let mut router = Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhooks);

    match services.admin_token {
        Some(token) => {
            let admin = admin_routes()
                .with_state(services.admin)
                .layer(middleware::from_fn_with_state(
                    AdminAuthState::new(token),
                    admin_auth_middleware,
                ));
            router = router.nest("/admin", admin);
        }
        None => tracing::warn!("No admin token configured; operator endpoints are disabled"),
    }

    router
        .layer(TimeoutLayer::new(services.request_timeout))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
}

/// GET /health - Liveness
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
