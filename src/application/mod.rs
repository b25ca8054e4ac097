//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Intake runs synchronously inside the HTTP request; job processing runs
//! on the worker pool.

pub mod handlers;

pub use handlers::{
    // Intake
    ProviderSecrets, ReceiveWebhookCommand, ReceiveWebhookHandler, ReceiveWebhookResult,
    // Pipeline
    JobOutcome, PipelinePorts, ProcessWebhookJobHandler,
    // Operator
    EventStatusFilter, ExportEventsHandler, ExportEventsQuery, ExportFormat, ExportedEvents,
    ManageJobsHandler,
};
