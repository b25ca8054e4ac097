//! Foundation module - Shared domain primitives.
//!
//! Identifiers, timestamps, the status state machine trait and the
//! error vocabulary used by every other layer.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{DomainError, ErrorCode, ValidationError};
pub use ids::{JobId, TransactionRecordId, UserId, WebhookEventId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
