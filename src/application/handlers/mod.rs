//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod webhook;

pub use webhook::{
    EventStatusFilter, ExportEventsHandler, ExportEventsQuery, ExportFormat, ExportedEvents,
    JobOutcome, ManageJobsHandler, PipelinePorts, ProcessWebhookJobHandler, ProviderSecrets,
    ReceiveWebhookCommand, ReceiveWebhookHandler, ReceiveWebhookResult,
};
