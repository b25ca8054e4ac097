//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `webhook` - Providers, signatures, extraction, events and transactions
//! - `job` - Retryable processing jobs and backoff

pub mod foundation;
pub mod job;
pub mod webhook;
