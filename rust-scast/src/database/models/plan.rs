//! Plan database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::domain::PlanPolicy;

/// Plan database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct PlanDbModel {
    pub id: String,
    pub name: String,
    /// Comma-separated list of media types (e.g. "audio,video").
    pub allowed_types: String,
    pub daily_limit_hours: f64,
    pub max_storage_mb: i64,
}

impl PlanDbModel {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        allowed_types: impl Into<String>,
        daily_limit_hours: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            allowed_types: allowed_types.into(),
            daily_limit_hours,
            max_storage_mb: 1024,
        }
    }

    pub fn policy(&self) -> PlanPolicy {
        PlanPolicy::from_stored(&self.allowed_types, self.daily_limit_hours)
    }
}
