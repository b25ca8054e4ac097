//! HTTP DTOs for operator endpoints.

use serde::{Deserialize, Serialize};

use crate::application::handlers::{ExportEventsQuery, EventStatusFilter, ExportFormat};
use crate::domain::foundation::ValidationError;
use crate::domain::job::{JobStatus, WebhookJob};
use crate::domain::webhook::Platform;
use crate::ports::QueueStats;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Query string of the export endpoint. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportParams {
    pub format: Option<String>,
    pub platform: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

impl TryFrom<ExportParams> for ExportEventsQuery {
    type Error = ValidationError;

    fn try_from(params: ExportParams) -> Result<Self, Self::Error> {
        let format = match params.format.as_deref() {
            Some(f) if !f.trim().is_empty() => f.parse::<ExportFormat>()?,
            _ => ExportFormat::default(),
        };
        let platform = match params.platform.as_deref() {
            Some(p) if !p.trim().is_empty() => Some(p.parse::<Platform>().map_err(|_| {
                ValidationError::invalid_format("platform", format!("unknown platform '{}'", p))
            })?),
            _ => None,
        };
        let status = match params.status.as_deref() {
            Some(s) if !s.trim().is_empty() => Some(s.parse::<EventStatusFilter>()?),
            _ => None,
        };

        Ok(ExportEventsQuery {
            format,
            platform,
            status,
            limit: params.limit,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub id: String,
    pub webhook_event_id: String,
    pub status: JobStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    /// ISO 8601.
    pub scheduled_at: String,
    pub processed_at: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
}

impl From<WebhookJob> for JobResponse {
    fn from(job: WebhookJob) -> Self {
        Self {
            id: job.id.to_string(),
            webhook_event_id: job.webhook_event_id.to_string(),
            status: job.status,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            scheduled_at: job.scheduled_at.to_rfc3339(),
            processed_at: job.processed_at.map(|t| t.to_rfc3339()),
            error: job.error,
            created_at: job.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatsResponse {
    pub backend: &'static str,
    #[serde(flatten)]
    pub stats: QueueStats,
}

/// Error body for operator endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}
