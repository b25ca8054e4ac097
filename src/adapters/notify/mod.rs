//! Upgrade notification adapters.

mod http_notifier;
mod log_notifier;

pub use http_notifier::{HttpNotifierConfig, HttpUpgradeNotifier};
pub use log_notifier::LogUpgradeNotifier;
