//! HTTP adapter for provider deliveries.
//!
//! - `POST /webhooks/payment` - signed delivery from Hotmart, Eduzz, Stripe,
//!   Kirvano or Monetizze

pub mod dto;
pub mod handlers;
pub mod platform_detection;
pub mod routes;

pub use handlers::{WebhookApiError, WebhookAppState};
pub use routes::webhook_routes;
