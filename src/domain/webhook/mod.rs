//! Webhook domain: providers, authenticity, extraction and the records the
//! pipeline writes.

mod errors;
mod event;
mod extractor;
mod plan;
mod platform;
pub mod signature;
mod transaction;

pub use errors::WebhookError;
pub use event::{EventFilter, WebhookEvent};
pub use extractor::{CanonicalEvent, EventExtractor, EventExtractorRegistry};
pub use plan::{PlanType, ProductCatalog, BILLING_PERIOD_DAYS};
pub use platform::Platform;
pub use signature::{SignatureVerifier, SignatureVerifierRegistry};
pub use transaction::{IdempotencyKey, Transaction};
