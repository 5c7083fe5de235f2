//! Account database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Account database model.
///
/// Only the fields the broadcaster needs: plan membership and the daily
/// usage counter.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct AccountDbModel {
    pub id: String,
    pub username: String,
    pub plan_id: String,
    /// Broadcast seconds consumed since `last_usage_reset`.
    pub usage_seconds: i64,
    /// `YYYY-MM-DD` date of the last usage reset.
    pub last_usage_reset: Option<String>,
    pub storage_used: i64,
    /// Unix epoch milliseconds (UTC) when the account was created.
    pub created_at: i64,
}

impl AccountDbModel {
    pub fn new(username: impl Into<String>, plan_id: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.into(),
            plan_id: plan_id.into(),
            usage_seconds: 0,
            last_usage_reset: None,
            storage_used: 0,
            created_at: crate::database::time::now_ms(),
        }
    }
}
