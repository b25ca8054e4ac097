//! UpgradeNotifier port - fire-and-forget customer notification.

use async_trait::async_trait;

use crate::domain::webhook::PlanType;

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport failed: {0}")]
    Transport(String),

    #[error("notification rejected with status {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait UpgradeNotifier: Send + Sync {
    async fn notify_upgrade(&self, email: &str, plan: PlanType) -> Result<(), NotifyError>;
}
