//! PlanEntitlements port - narrow contract with the plan/usage collaborator.
//!
//! The service never evaluates plan limits itself. It only asks the
//! collaborator to grant a plan for one billing period and reset usage.

use async_trait::async_trait;

use crate::domain::foundation::{Timestamp, UserId};
use crate::domain::webhook::PlanType;

/// Outcome of a successful upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanGrant {
    pub user_id: UserId,
    pub plan_type: PlanType,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum EntitlementError {
    #[error("account {0} does not exist")]
    UnknownAccount(UserId),

    #[error("entitlement store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait PlanEntitlements: Send + Sync {
    /// Sets `plan` with an expiry one billing period from now and resets
    /// the account's usage counters.
    async fn apply_plan_upgrade(
        &self,
        user_id: &UserId,
        plan: PlanType,
    ) -> Result<PlanGrant, EntitlementError>;
}
