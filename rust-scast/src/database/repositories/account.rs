//! Account repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::AccountDbModel;

/// Account repository trait.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn create(&self, account: &AccountDbModel) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<AccountDbModel>>;

    async fn update_plan(&self, id: &str, plan_id: &str) -> Result<()>;
}

/// SQLx implementation of AccountRepository.
pub struct SqlxAccountRepository {
    pool: SqlitePool,
}

impl SqlxAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for SqlxAccountRepository {
    async fn create(&self, account: &AccountDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, username, plan_id, usage_seconds, last_usage_reset, storage_used, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.id)
        .bind(&account.username)
        .bind(&account.plan_id)
        .bind(account.usage_seconds)
        .bind(&account.last_usage_reset)
        .bind(account.storage_used)
        .bind(account.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<AccountDbModel>> {
        let account = sqlx::query_as::<_, AccountDbModel>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(account)
    }

    async fn update_plan(&self, id: &str, plan_id: &str) -> Result<()> {
        let result = sqlx::query("UPDATE accounts SET plan_id = ? WHERE id = ?")
            .bind(plan_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(crate::Error::not_found("Account", id));
        }
        Ok(())
    }
}
