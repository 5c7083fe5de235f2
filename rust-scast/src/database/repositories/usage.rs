//! Per-account daily usage ledger.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};

use crate::Result;
use crate::database::time::UsageResetPolicy;

/// Persistent counter of broadcast seconds consumed per account per day.
///
/// Every read or increment first applies the daily reset: if the stored
/// reset date is not today, the counter is zeroed and the date advanced in
/// the same transaction.
#[async_trait]
pub trait UsageLedger: Send + Sync {
    /// Current usage in seconds.
    async fn get_usage(&self, account_id: &str) -> Result<u64>;

    /// Atomically add `delta_secs` and return the new total.
    async fn add_usage(&self, account_id: &str, delta_secs: u64) -> Result<u64>;

    /// Zero the counter and mark it as reset today.
    async fn reset_usage(&self, account_id: &str) -> Result<()>;
}

/// SQLx implementation of UsageLedger backed by the `accounts` table.
pub struct SqlxUsageLedger {
    pool: SqlitePool,
    reset_policy: UsageResetPolicy,
}

impl SqlxUsageLedger {
    pub fn new(pool: SqlitePool, reset_policy: UsageResetPolicy) -> Self {
        Self { pool, reset_policy }
    }

    /// Zero a counter whose reset date is stale. Returns whether a reset happened.
    ///
    /// Issued as the first statement of every ledger transaction so SQLite
    /// takes the write lock up front.
    async fn reset_if_stale(
        conn: &mut SqliteConnection,
        account_id: &str,
        today: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE accounts SET usage_seconds = 0, last_usage_reset = ?
            WHERE id = ? AND (last_usage_reset IS NULL OR last_usage_reset <> ?)
            "#,
        )
        .bind(today)
        .bind(account_id)
        .bind(today)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl UsageLedger for SqlxUsageLedger {
    async fn get_usage(&self, account_id: &str) -> Result<u64> {
        let today = self.reset_policy.today_string();
        let mut tx = self.pool.begin().await?;

        if Self::reset_if_stale(&mut tx, account_id, &today).await? {
            tracing::debug!(account_id, %today, "Daily usage reset");
        }

        let usage: Option<(i64,)> =
            sqlx::query_as("SELECT usage_seconds FROM accounts WHERE id = ?")
                .bind(account_id)
                .fetch_optional(&mut *tx)
                .await?;

        tx.commit().await?;

        usage
            .map(|(secs,)| secs.max(0) as u64)
            .ok_or_else(|| crate::Error::not_found("Account", account_id))
    }

    async fn add_usage(&self, account_id: &str, delta_secs: u64) -> Result<u64> {
        let today = self.reset_policy.today_string();
        let mut tx = self.pool.begin().await?;

        Self::reset_if_stale(&mut tx, account_id, &today).await?;

        let total: Option<(i64,)> = sqlx::query_as(
            "UPDATE accounts SET usage_seconds = usage_seconds + ? WHERE id = ? RETURNING usage_seconds",
        )
        .bind(delta_secs as i64)
        .bind(account_id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;

        total
            .map(|(secs,)| secs.max(0) as u64)
            .ok_or_else(|| crate::Error::not_found("Account", account_id))
    }

    async fn reset_usage(&self, account_id: &str) -> Result<()> {
        let today = self.reset_policy.today_string();
        let result = sqlx::query(
            "UPDATE accounts SET usage_seconds = 0, last_usage_reset = ? WHERE id = ?",
        )
        .bind(&today)
        .bind(account_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::Error::not_found("Account", account_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::AccountDbModel;
    use crate::database::repositories::{AccountRepository, SqlxAccountRepository};
    use crate::database::test_pool;

    async fn setup() -> (SqlitePool, String) {
        let pool = test_pool().await;
        let account = AccountDbModel::new("dave", "free");
        SqlxAccountRepository::new(pool.clone())
            .create(&account)
            .await
            .unwrap();
        (pool, account.id)
    }

    #[tokio::test]
    async fn test_add_usage_accumulates() {
        let (pool, id) = setup().await;
        let ledger = SqlxUsageLedger::new(pool, UsageResetPolicy::Utc);

        assert_eq!(ledger.get_usage(&id).await.unwrap(), 0);
        assert_eq!(ledger.add_usage(&id, 6).await.unwrap(), 6);
        assert_eq!(ledger.add_usage(&id, 5).await.unwrap(), 11);
        assert_eq!(ledger.get_usage(&id).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_stale_reset_date_zeroes_usage_on_read() {
        let (pool, id) = setup().await;
        sqlx::query("UPDATE accounts SET usage_seconds = 500, last_usage_reset = '2000-01-01' WHERE id = ?")
            .bind(&id)
            .execute(&pool)
            .await
            .unwrap();

        let ledger = SqlxUsageLedger::new(pool.clone(), UsageResetPolicy::Utc);
        assert_eq!(ledger.get_usage(&id).await.unwrap(), 0);

        let (stored,): (Option<String>,) =
            sqlx::query_as("SELECT last_usage_reset FROM accounts WHERE id = ?")
                .bind(&id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(stored, Some(UsageResetPolicy::Utc.today_string()));
    }

    #[tokio::test]
    async fn test_stale_reset_date_zeroes_usage_before_increment() {
        let (pool, id) = setup().await;
        sqlx::query("UPDATE accounts SET usage_seconds = 500, last_usage_reset = '2000-01-01' WHERE id = ?")
            .bind(&id)
            .execute(&pool)
            .await
            .unwrap();

        let ledger = SqlxUsageLedger::new(pool, UsageResetPolicy::Utc);
        assert_eq!(ledger.add_usage(&id, 7).await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_current_reset_date_keeps_usage() {
        let (pool, id) = setup().await;
        sqlx::query("UPDATE accounts SET usage_seconds = 120, last_usage_reset = ? WHERE id = ?")
            .bind(UsageResetPolicy::Utc.today_string())
            .bind(&id)
            .execute(&pool)
            .await
            .unwrap();

        let ledger = SqlxUsageLedger::new(pool, UsageResetPolicy::Utc);
        assert_eq!(ledger.get_usage(&id).await.unwrap(), 120);
    }

    #[tokio::test]
    async fn test_reset_usage() {
        let (pool, id) = setup().await;
        let ledger = SqlxUsageLedger::new(pool, UsageResetPolicy::Utc);
        ledger.add_usage(&id, 30).await.unwrap();
        ledger.reset_usage(&id).await.unwrap();
        assert_eq!(ledger.get_usage(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_account() {
        let ledger = SqlxUsageLedger::new(test_pool().await, UsageResetPolicy::Utc);
        assert!(matches!(
            ledger.get_usage("ghost").await.unwrap_err(),
            crate::Error::NotFound { .. }
        ));
        assert!(matches!(
            ledger.add_usage("ghost", 5).await.unwrap_err(),
            crate::Error::NotFound { .. }
        ));
    }
}
