//! ExportEventsHandler - CSV / JSON dump of stored webhook events.

use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, ValidationError};
use crate::domain::webhook::{EventFilter, Platform, WebhookEvent};
use crate::ports::WebhookEventRepository;

pub const DEFAULT_EXPORT_LIMIT: u32 = 1_000;
pub const MAX_EXPORT_LIMIT: u32 = 10_000;

const CSV_HEADER: [&str; 8] = [
    "Date",
    "Platform",
    "Event Type",
    "User Email",
    "Transaction ID",
    "Status",
    "Error",
    "Attempts",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl FromStr for ExportFormat {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(ValidationError::invalid_format(
                "format",
                format!("expected csv or json, got '{}'", other),
            )),
        }
    }
}

/// Export status filter, matching `WebhookEvent::status_label`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatusFilter {
    Processed,
    Pending,
    Failed,
}

impl EventStatusFilter {
    fn as_str(&self) -> &'static str {
        match self {
            EventStatusFilter::Processed => "processed",
            EventStatusFilter::Pending => "pending",
            EventStatusFilter::Failed => "failed",
        }
    }
}

impl FromStr for EventStatusFilter {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "processed" => Ok(EventStatusFilter::Processed),
            "pending" => Ok(EventStatusFilter::Pending),
            "failed" => Ok(EventStatusFilter::Failed),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportEventsQuery {
    pub format: ExportFormat,
    pub platform: Option<Platform>,
    pub status: Option<EventStatusFilter>,
    pub limit: Option<u32>,
}

/// Rendered export, ready to send.
#[derive(Debug, Clone)]
pub struct ExportedEvents {
    pub content_type: &'static str,
    pub filename: String,
    pub body: Vec<u8>,
    pub rows: usize,
}

#[derive(Debug, Serialize)]
struct ExportRow<'a> {
    date: String,
    platform: &'static str,
    event_type: &'a str,
    user_email: &'a str,
    transaction_id: &'a str,
    status: &'static str,
    error: &'a str,
    attempts: u32,
}

impl<'a> From<&'a WebhookEvent> for ExportRow<'a> {
    fn from(event: &'a WebhookEvent) -> Self {
        Self {
            date: event.created_at.to_rfc3339(),
            platform: event.platform.as_str(),
            event_type: &event.event_type,
            user_email: &event.user_email,
            transaction_id: &event.transaction_id,
            status: event.status_label(),
            error: event.error_message.as_deref().unwrap_or(""),
            attempts: event.processing_attempts,
        }
    }
}

pub struct ExportEventsHandler {
    events: Arc<dyn WebhookEventRepository>,
}

impl ExportEventsHandler {
    pub fn new(events: Arc<dyn WebhookEventRepository>) -> Self {
        Self { events }
    }

    pub async fn handle(&self, query: ExportEventsQuery) -> Result<ExportedEvents, DomainError> {
        let limit = query
            .limit
            .unwrap_or(DEFAULT_EXPORT_LIMIT)
            .clamp(1, MAX_EXPORT_LIMIT);

        let filter = EventFilter {
            platform: query.platform,
            processed: query
                .status
                .map(|status| status == EventStatusFilter::Processed),
            limit: Some(limit),
        };

        let events: Vec<WebhookEvent> = self
            .events
            .list(&filter)
            .await?
            .into_iter()
            .filter(|event| {
                query
                    .status
                    .map(|status| event.status_label() == status.as_str())
                    .unwrap_or(true)
            })
            .collect();

        let rows: Vec<ExportRow<'_>> = events.iter().map(ExportRow::from).collect();
        let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S");

        let export = match query.format {
            ExportFormat::Csv => ExportedEvents {
                content_type: "text/csv; charset=utf-8",
                filename: format!("webhook-events-{}.csv", stamp),
                body: render_csv(&rows)?,
                rows: rows.len(),
            },
            ExportFormat::Json => ExportedEvents {
                content_type: "application/json",
                filename: format!("webhook-events-{}.json", stamp),
                body: serde_json::to_vec_pretty(&rows).map_err(|e| {
                    DomainError::database(format!("Failed to encode export: {}", e))
                })?,
                rows: rows.len(),
            },
        };

        tracing::info!(rows = export.rows, format = ?query.format, "Webhook events exported");
        Ok(export)
    }
}

fn render_csv(rows: &[ExportRow<'_>]) -> Result<Vec<u8>, DomainError> {
    let encode_err = |e: csv::Error| DomainError::database(format!("Failed to write CSV: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(CSV_HEADER).map_err(encode_err)?;
    for row in rows {
        let attempts = row.attempts.to_string();
        writer
            .write_record([
                row.date.as_str(),
                row.platform,
                row.event_type,
                row.user_email,
                row.transaction_id,
                row.status,
                row.error,
                attempts.as_str(),
            ])
            .map_err(encode_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| DomainError::database(format!("Failed to flush CSV: {}", e)))
}
