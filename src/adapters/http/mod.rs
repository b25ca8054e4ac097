//! HTTP adapters - REST API implementations.
//!
//! - `webhooks` - provider intake
//! - `admin` - export and job operations
//! - `middleware` - rate limiting and operator auth

pub mod admin;
pub mod middleware;
pub mod router;
pub mod webhooks;

pub use admin::AdminAppState;
pub use router::{build_router, HttpServices, BODY_LIMIT_BYTES};
pub use webhooks::WebhookAppState;
