//! Application-wide error types.

use thiserror::Error;

use crate::domain::MediaType;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The selection is empty or contains nothing that can be broadcast.
    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    /// The account's plan does not allow the media type the selection requires.
    #[error("Media type '{0}' is not supported by the current plan")]
    UnsupportedMediaType(MediaType),

    #[error("Daily broadcast limit reached ({usage_secs}s used of {limit_secs}s)")]
    QuotaExhausted { usage_secs: u64, limit_secs: u64 },

    /// The encoding engine refused or failed to launch the job.
    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Database error: {0}")]
    DatabaseSqlx(#[from] sqlx::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn invalid_selection(msg: impl Into<String>) -> Self {
        Self::InvalidSelection(msg.into())
    }

    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidSelection(_) => "INVALID_SELECTION",
            Self::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            Self::QuotaExhausted { .. } => "QUOTA_EXHAUSTED",
            Self::Engine(_) => "ENGINE_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::DatabaseSqlx(_) | Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_)
            | Self::Io(_)
            | Self::ApiError(_)
            | Self::Other(_) => "INTERNAL_ERROR",
        }
    }
}
