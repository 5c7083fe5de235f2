//! Media item repository.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::Result;
use crate::database::models::MediaItemDbModel;
use crate::domain::MediaItem;

/// Read access to stored media items.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Resolve the given ids for an account, in the order the ids were given.
    ///
    /// Ids that do not exist or belong to another account are skipped.
    async fn find_items(&self, account_id: &str, ids: &[String]) -> Result<Vec<MediaItem>>;

    /// Resolve a single item owned by the account.
    async fn find_item(&self, account_id: &str, id: &str) -> Result<Option<MediaItem>>;
}

/// SQLx implementation of MediaStore.
pub struct SqlxMediaRepository {
    pool: SqlitePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, item: &MediaItemDbModel) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO media_items (
                id, account_id, filename, path, size_bytes, media_type, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(&item.account_id)
        .bind(&item.filename)
        .bind(&item.path)
        .bind(item.size_bytes)
        .bind(&item.media_type)
        .bind(item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_for_account(&self, account_id: &str) -> Result<Vec<MediaItemDbModel>> {
        let items = sqlx::query_as::<_, MediaItemDbModel>(
            "SELECT * FROM media_items WHERE account_id = ? ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

#[async_trait]
impl MediaStore for SqlxMediaRepository {
    async fn find_items(&self, account_id: &str, ids: &[String]) -> Result<Vec<MediaItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; ids.len()].join(",");
        let sql = format!(
            "SELECT * FROM media_items WHERE account_id = ? AND id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, MediaItemDbModel>(&sql).bind(account_id);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let by_id: HashMap<String, MediaItemDbModel> =
            rows.into_iter().map(|row| (row.id.clone(), row)).collect();

        // Preserve selection order; a repeated id is played once per occurrence.
        let items = ids
            .iter()
            .filter_map(|id| by_id.get(id).cloned())
            .filter_map(|row| {
                let id = row.id.clone();
                let item = row.into_domain();
                if item.is_none() {
                    tracing::warn!(media_id = %id, "Skipping media item with unknown type");
                }
                item
            })
            .collect();

        Ok(items)
    }

    async fn find_item(&self, account_id: &str, id: &str) -> Result<Option<MediaItem>> {
        let row = sqlx::query_as::<_, MediaItemDbModel>(
            "SELECT * FROM media_items WHERE account_id = ? AND id = ?",
        )
        .bind(account_id)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.and_then(MediaItemDbModel::into_domain))
    }
}
