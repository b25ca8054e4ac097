//! Webhook command and query handlers.

mod export_events;
mod manage_jobs;
mod process_webhook_job;
mod receive_webhook;

pub use export_events::{
    EventStatusFilter, ExportEventsHandler, ExportEventsQuery, ExportFormat, ExportedEvents,
    DEFAULT_EXPORT_LIMIT, MAX_EXPORT_LIMIT,
};
pub use manage_jobs::ManageJobsHandler;
pub use process_webhook_job::{JobOutcome, PipelinePorts, ProcessWebhookJobHandler};
pub use receive_webhook::{
    ProviderSecrets, ReceiveWebhookCommand, ReceiveWebhookHandler, ReceiveWebhookResult,
};
