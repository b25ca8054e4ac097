//! In-memory stand-ins for the account, entitlement and notification
//! collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::webhook::{PlanType, BILLING_PERIOD_DAYS};
use crate::ports::{
    EntitlementError, NotifyError, PlanEntitlements, PlanGrant, UpgradeNotifier, UserAccount,
    UserDirectory,
};

/// Accounts keyed by lower-cased email.
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserDirectory {
    users: Arc<RwLock<HashMap<String, UserAccount>>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: UserAccount) {
        self.users
            .write()
            .await
            .insert(user.email.to_lowercase(), user);
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DomainError> {
        Ok(self.users.read().await.get(&email.to_lowercase()).cloned())
    }
}

/// Records granted plans and can be told to fail the next few calls.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPlanEntitlements {
    grants: Arc<RwLock<Vec<PlanGrant>>>,
    failures_remaining: Arc<AtomicU32>,
}

impl InMemoryPlanEntitlements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` upgrades fail with `Unavailable`.
    pub fn fail_next(&self, n: u32) {
        self.failures_remaining.store(n, Ordering::SeqCst);
    }

    pub async fn grants(&self) -> Vec<PlanGrant> {
        self.grants.read().await.clone()
    }
}

#[async_trait]
impl PlanEntitlements for InMemoryPlanEntitlements {
    async fn apply_plan_upgrade(
        &self,
        user_id: &UserId,
        plan: PlanType,
    ) -> Result<PlanGrant, EntitlementError> {
        let should_fail = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(EntitlementError::Unavailable("injected failure".to_string()));
        }

        let grant = PlanGrant {
            user_id: *user_id,
            plan_type: plan,
            expires_at: Timestamp::now().add_days(BILLING_PERIOD_DAYS),
        };
        self.grants.write().await.push(grant.clone());
        Ok(grant)
    }
}

/// Captures notifications instead of sending them.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<RwLock<Vec<(String, PlanType)>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every call fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub async fn sent(&self) -> Vec<(String, PlanType)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl UpgradeNotifier for RecordingNotifier {
    async fn notify_upgrade(&self, email: &str, plan: PlanType) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("recording notifier set to fail".to_string()));
        }
        self.sent.write().await.push((email.to_string(), plan));
        Ok(())
    }
}
