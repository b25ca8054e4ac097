//! HTTP middleware for axum.
//!
//! - `rate_limit` - Global and per-IP request limits
//! - `admin_auth` - Bearer-token guard for operator routes

pub mod admin_auth;
pub mod rate_limit;

pub use admin_auth::{admin_auth_middleware, AdminAuthState};
pub use rate_limit::{extract_client_ip, rate_limit_middleware, RateLimiterState};
