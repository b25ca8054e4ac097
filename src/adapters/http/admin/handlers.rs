//! HTTP handlers for operator endpoints.
//!
//! Mounted behind [`admin_auth_middleware`](crate::adapters::http::middleware::admin_auth_middleware).

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::application::handlers::{ExportEventsHandler, ExportEventsQuery, ManageJobsHandler};
use crate::domain::foundation::{DomainError, ErrorCode, JobId, ValidationError};
use crate::ports::QueueError;

use super::dto::{ErrorResponse, ExportParams, JobResponse, QueueStatsResponse};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct AdminAppState {
    pub export: Arc<ExportEventsHandler>,
    pub jobs: Arc<ManageJobsHandler>,
}

impl AdminAppState {
    pub fn new(export: ExportEventsHandler, jobs: ManageJobsHandler) -> Self {
        Self {
            export: Arc::new(export),
            jobs: Arc::new(jobs),
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Export
// ════════════════════════════════════════════════════════════════════════════════

/// GET /admin/webhooks/events/export - CSV or JSON dump of stored events
pub async fn export_events(
    State(state): State<AdminAppState>,
    Query(params): Query<ExportParams>,
) -> Result<Response, AdminApiError> {
    let query = ExportEventsQuery::try_from(params)?;
    let export = state.export.handle(query).await?;

    let disposition = format!("attachment; filename=\"{}\"", export.filename);
    let mut response = (StatusCode::OK, export.body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(export.content_type));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    headers.insert("x-export-rows", HeaderValue::from(export.rows));

    Ok(response)
}

// ════════════════════════════════════════════════════════════════════════════════
// Jobs
// ════════════════════════════════════════════════════════════════════════════════

/// GET /admin/jobs/stats - Job counts by status
pub async fn job_stats(
    State(state): State<AdminAppState>,
) -> Result<Json<QueueStatsResponse>, AdminApiError> {
    let stats = state.jobs.stats().await?;
    Ok(Json(QueueStatsResponse {
        backend: state.jobs.backend(),
        stats,
    }))
}

/// GET /admin/jobs/:id - Single job
pub async fn get_job(
    State(state): State<AdminAppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AdminApiError> {
    let job = state.jobs.get(&parse_job_id(&id)?).await?;
    Ok(Json(JobResponse::from(job)))
}

/// POST /admin/jobs/:id/retry - Requeue a failed job
pub async fn retry_job(
    State(state): State<AdminAppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AdminApiError> {
    let job = state.jobs.retry(&parse_job_id(&id)?).await?;
    Ok(Json(JobResponse::from(job)))
}

/// POST /admin/jobs/:id/cancel - Terminally fail a pending or processing job
pub async fn cancel_job(
    State(state): State<AdminAppState>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, AdminApiError> {
    let job = state.jobs.cancel(&parse_job_id(&id)?).await?;
    Ok(Json(JobResponse::from(job)))
}

fn parse_job_id(raw: &str) -> Result<JobId, AdminApiError> {
    raw.parse().map_err(|_| {
        AdminApiError::from(ValidationError::invalid_format("id", "expected a UUID"))
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug)]
pub enum AdminApiError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Unavailable(String),
    Internal(String),
}

impl From<ValidationError> for AdminApiError {
    fn from(err: ValidationError) -> Self {
        AdminApiError::Validation(err.to_string())
    }
}

impl From<QueueError> for AdminApiError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::NotFound(_) => AdminApiError::NotFound(err.to_string()),
            QueueError::InvalidState(_) => AdminApiError::Conflict(err.to_string()),
            QueueError::Unavailable(_) => AdminApiError::Unavailable(err.to_string()),
            QueueError::Corrupt(_) => AdminApiError::Internal(err.to_string()),
        }
    }
}

impl From<DomainError> for AdminApiError {
    fn from(err: DomainError) -> Self {
        match err.code {
            ErrorCode::ValidationFailed => AdminApiError::Validation(err.to_string()),
            ErrorCode::WebhookEventNotFound | ErrorCode::JobNotFound | ErrorCode::UserNotFound => {
                AdminApiError::NotFound(err.to_string())
            }
            _ => AdminApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AdminApiError::Validation(m) => (StatusCode::BAD_REQUEST, "VALIDATION_FAILED", m),
            AdminApiError::NotFound(m) => (StatusCode::NOT_FOUND, "NOT_FOUND", m),
            AdminApiError::Conflict(m) => (StatusCode::CONFLICT, "INVALID_STATE_TRANSITION", m),
            AdminApiError::Unavailable(m) => {
                tracing::error!(error = %m, "Queue backend unavailable");
                (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_UNAVAILABLE", m)
            }
            AdminApiError::Internal(m) => {
                tracing::error!(error = %m, "Admin request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
