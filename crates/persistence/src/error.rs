//! # Persistence Errors
//!
//! Error types for the persistence layer, wrapping sqlx, IO and JSON errors.

use britewallet_core::CoreError;
use thiserror::Error;

/// Persistence layer errors
#[derive(Debug, Error)]
pub enum PersistenceError {
    // === Database errors ===
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Record already exists: {entity} with id {id}")]
    AlreadyExists { entity: String, id: String },

    /// Optimistic update lost against a concurrent writer
    #[error("Version conflict on {entity} {id}: expected version {expected}")]
    VersionConflict {
        entity: String,
        id: String,
        expected: i64,
    },

    // === Queue errors ===
    #[error("Queue IO error: {0}")]
    QueueIo(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // === Conversion errors ===
    #[error("Invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("Invalid enum value: {field} = {value}")]
    InvalidEnumValue { field: String, value: String },

    #[error("Invalid stored record: {0}")]
    Domain(#[from] CoreError),

    // === Other errors ===
    #[error("{0}")]
    Other(String),
}

/// Result type alias for PersistenceError
pub type PersistenceResult<T> = Result<T, PersistenceError>;

impl PersistenceError {
    pub fn not_found(entity: &str, id: &str) -> Self {
        Self::NotFound {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn already_exists(entity: &str, id: &str) -> Self {
        Self::AlreadyExists {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn version_conflict(entity: &str, id: &str, expected: i64) -> Self {
        Self::VersionConflict {
            entity: entity.to_string(),
            id: id.to_string(),
            expected,
        }
    }

    pub fn invalid_enum(field: &str, value: &str) -> Self {
        Self::InvalidEnumValue {
            field: field.to_string(),
            value: value.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_database_error(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}
