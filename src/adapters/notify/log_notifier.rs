//! Notifier used when no mailer endpoint is configured.

use async_trait::async_trait;

use crate::domain::webhook::PlanType;
use crate::ports::{NotifyError, UpgradeNotifier};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogUpgradeNotifier;

#[async_trait]
impl UpgradeNotifier for LogUpgradeNotifier {
    async fn notify_upgrade(&self, email: &str, plan: PlanType) -> Result<(), NotifyError> {
        tracing::info!(user_email = %email, plan = %plan.as_str(), "Plan upgrade notice (no mailer configured)");
        Ok(())
    }
}
