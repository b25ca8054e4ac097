//! Axum router for operator endpoints.

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{cancel_job, export_events, get_job, job_stats, retry_job, AdminAppState};

/// Create the admin router, to be nested at `/admin`.
///
/// # Routes
/// - `GET /webhooks/events/export` - CSV/JSON export
/// - `GET /jobs/stats` - Counts by status
/// - `GET /jobs/:id` - Single job
/// - `POST /jobs/:id/retry` - Requeue a failed job
/// - `POST /jobs/:id/cancel` - Cancel a pending or processing job
pub fn admin_routes() -> Router<AdminAppState> {
    Router::new()
        .route("/webhooks/events/export", get(export_events))
        .route("/jobs/stats", get(job_stats))
        .route("/jobs/:id", get(get_job))
        .route("/jobs/:id/retry", post(retry_job))
        .route("/jobs/:id/cancel", post(cancel_job))
}
