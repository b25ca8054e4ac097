//! payhook - payment-provider webhook intake and plan-upgrade pipeline.
//!
//! Verified deliveries from Hotmart, Eduzz, Stripe, Kirvano and Monetizze are
//! stored, queued, and processed by a worker pool that records the purchase,
//! upgrades the buyer's plan and notifies them.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
