//! Media item database model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::path::PathBuf;

use crate::domain::{MediaItem, MediaType};

/// Media item database model.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct MediaItemDbModel {
    pub id: String,
    pub account_id: String,
    pub filename: String,
    pub path: String,
    pub size_bytes: i64,
    /// One of "video", "audio", "image".
    pub media_type: String,
    /// Unix epoch milliseconds (UTC) when the item was stored.
    pub created_at: i64,
}

impl MediaItemDbModel {
    pub fn new(
        account_id: impl Into<String>,
        path: impl Into<PathBuf>,
        size_bytes: u64,
        media_type: MediaType,
    ) -> Self {
        let path = path.into();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            filename,
            path: path.to_string_lossy().to_string(),
            size_bytes: size_bytes as i64,
            media_type: media_type.as_str().to_string(),
            created_at: crate::database::time::now_ms(),
        }
    }

    /// Convert to the domain type.
    ///
    /// Returns `None` when the stored media type is not recognized.
    pub fn into_domain(self) -> Option<MediaItem> {
        let media_type = MediaType::parse(&self.media_type)?;
        Some(MediaItem {
            id: self.id,
            account_id: self.account_id,
            filename: self.filename,
            path: PathBuf::from(self.path),
            size_bytes: self.size_bytes.max(0) as u64,
            media_type,
        })
    }
}
