//! UserDirectory port - read-only lookup into the account service.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::webhook::PlanType;

/// The slice of an account the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: String,
    pub plan_type: PlanType,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Looks up an account by email. Callers pass lower-cased emails.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DomainError>;
}
