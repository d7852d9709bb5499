//! Unified error types for storage operations.

use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    // ========================================================================
    // Backend errors
    // ========================================================================
    /// MongoDB driver error.
    #[error("live store error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// MySQL error.
    #[error("archive store error: {0}")]
    Sql(#[from] sqlx::Error),

    /// Backend not reachable or not configured.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    // ========================================================================
    // Generic errors (any backend)
    // ========================================================================
    /// Error serializing or deserializing data.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entity not found.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Entity already exists.
    #[error("{entity_type} already exists: {id}")]
    Conflict {
        entity_type: &'static str,
        id: String,
    },
}

impl StorageError {
    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Create a not found error.
    pub fn not_found(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            id: id.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(entity_type: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity_type,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Convenience type alias for storage results.
pub type StorageResult<T> = Result<T, StorageError>;
