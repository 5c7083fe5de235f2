//! Plan policy repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::PlanDbModel;
use crate::domain::PlanPolicy;

/// Resolves what an account is allowed to broadcast.
#[async_trait]
pub trait PlanPolicyProvider: Send + Sync {
    /// Get the policy of the plan the account belongs to.
    async fn get_policy(&self, account_id: &str) -> Result<PlanPolicy>;
}

/// SQLx implementation of PlanPolicyProvider.
pub struct SqlxPlanRepository {
    pool: SqlitePool,
}

impl SqlxPlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace a plan.
    pub async fn upsert(&self, plan: &PlanDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO plans (id, name, allowed_types, daily_limit_hours, max_storage_mb)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.name)
        .bind(&plan.allowed_types)
        .bind(plan.daily_limit_hours)
        .bind(plan.max_storage_mb)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<PlanDbModel>> {
        let plan = sqlx::query_as::<_, PlanDbModel>("SELECT * FROM plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(plan)
    }

    pub async fn list(&self) -> Result<Vec<PlanDbModel>> {
        let plans = sqlx::query_as::<_, PlanDbModel>("SELECT * FROM plans ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(plans)
    }
}

#[async_trait]
impl PlanPolicyProvider for SqlxPlanRepository {
    async fn get_policy(&self, account_id: &str) -> Result<PlanPolicy> {
        let plan = sqlx::query_as::<_, PlanDbModel>(
            r#"
            SELECT p.* FROM plans p
            JOIN accounts a ON a.plan_id = p.id
            WHERE a.id = ?
            "#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| crate::Error::not_found("Account", account_id))?;

        Ok(plan.policy())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::AccountDbModel;
    use crate::database::repositories::{AccountRepository, SqlxAccountRepository};
    use crate::database::test_pool;
    use crate::domain::MediaType;

    #[tokio::test]
    async fn test_get_policy_for_account() {
        let pool = test_pool().await;
        let plans = SqlxPlanRepository::new(pool.clone());
        let accounts = SqlxAccountRepository::new(pool);

        plans
            .upsert(&PlanDbModel::new("trial", "Trial", "audio", 0.5))
            .await
            .unwrap();
        let account = AccountDbModel::new("carol", "trial");
        accounts.create(&account).await.unwrap();

        let policy = plans.get_policy(&account.id).await.unwrap();
        assert!(policy.allows(MediaType::Audio));
        assert!(!policy.allows(MediaType::Video));
        assert_eq!(policy.daily_limit_secs, 1800);
    }

    #[tokio::test]
    async fn test_get_policy_unknown_account() {
        let plans = SqlxPlanRepository::new(test_pool().await);
        let err = plans.get_policy("nobody").await.unwrap_err();
        assert!(matches!(err, crate::Error::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_seeded_plans() {
        let plans = SqlxPlanRepository::new(test_pool().await);
        let pro = plans.find_by_id("pro").await.unwrap().unwrap();
        assert!(pro.policy().allows(MediaType::Video));
        assert_eq!(plans.list().await.unwrap().len(), 2);
    }
}
