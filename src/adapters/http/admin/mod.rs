//! HTTP adapter for operator endpoints.
//!
//! - `GET /admin/webhooks/events/export` - Event export
//! - `GET /admin/jobs/stats`, `GET /admin/jobs/:id`
//! - `POST /admin/jobs/:id/retry`, `POST /admin/jobs/:id/cancel`

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{AdminApiError, AdminAppState};
pub use routes::admin_routes;
