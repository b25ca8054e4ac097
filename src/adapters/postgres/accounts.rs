//! PostgreSQL adapters for the account collaborators.
//!
//! `users` and `usage_counters` belong to the wider product; this service
//! only looks accounts up by email and applies plan upgrades to them.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::webhook::{PlanType, BILLING_PERIOD_DAYS};
use crate::ports::{EntitlementError, PlanEntitlements, PlanGrant, UserAccount, UserDirectory};

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    plan_type: String,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let plan_type: PlanType = row.plan_type.parse().map_err(|_| {
            DomainError::database(format!("Invalid plan value: {}", row.plan_type))
        })?;
        Ok(UserAccount {
            id: UserId::from_uuid(row.id),
            email: row.email,
            plan_type,
        })
    }
}

pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<UserAccount>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, email, plan_type
            FROM users
            WHERE LOWER(email) = LOWER($1)
            "#,
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to find user: {}", e)))?;

        row.map(UserAccount::try_from).transpose()
    }
}

pub struct PostgresPlanEntitlements {
    pool: PgPool,
}

impl PostgresPlanEntitlements {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlanEntitlements for PostgresPlanEntitlements {
    /// Sets the plan for one billing period and zeroes the usage counters,
    /// in one database transaction.
    async fn apply_plan_upgrade(
        &self,
        user_id: &UserId,
        plan: PlanType,
    ) -> Result<PlanGrant, EntitlementError> {
        let unavailable = |e: sqlx::Error| EntitlementError::Unavailable(e.to_string());
        let expires_at = Timestamp::now().add_days(BILLING_PERIOD_DAYS);

        let mut tx = self.pool.begin().await.map_err(unavailable)?;

        let updated = sqlx::query(
            r#"
            UPDATE users
            SET plan_type = $2, plan_expires_at = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(plan.as_str())
        .bind(expires_at.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        if updated.rows_affected() == 0 {
            return Err(EntitlementError::UnknownAccount(*user_id));
        }

        sqlx::query(
            r#"
            UPDATE usage_counters
            SET count = 0, reset_at = NOW()
            WHERE user_id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&mut *tx)
        .await
        .map_err(unavailable)?;

        tx.commit().await.map_err(unavailable)?;

        Ok(PlanGrant {
            user_id: *user_id,
            plan_type: plan,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_row_converts_plan() {
        let account = UserAccount::try_from(UserRow {
            id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            plan_type: "starter".to_string(),
        })
        .unwrap();
        assert_eq!(account.plan_type, PlanType::Starter);
    }

    #[test]
    fn unknown_plan_is_rejected() {
        let result = UserAccount::try_from(UserRow {
            id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            plan_type: "enterprise".to_string(),
        });
        assert!(result.is_err());
    }
}
