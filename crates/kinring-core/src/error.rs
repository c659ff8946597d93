//! Core error types for kinring-core.
//!
//! Null dates and unknown cadences are not errors anywhere in this crate;
//! they route to fallback behaviour inside the engine. What remains here is
//! storage, configuration, validation and identity failures.

use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

/// Core error type for kinring-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Progress is keyed by user identity; nothing runs without one.
    #[error(transparent)]
    InvalidUser(#[from] InvalidUserError),

    /// The streak row moved underneath us more times than we are willing to retry.
    #[error("Streak for user {user_id} changed concurrently after {attempts} attempts")]
    StreakConflict { user_id: Uuid, attempts: u32 },

    /// A referenced record does not exist
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Raised when an evaluation is attempted without a usable user identity.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidUserError {
    /// No user id was supplied (nil UUID or unset config)
    #[error("Invalid user: no user identity supplied")]
    Missing,

    /// The id is well-formed but no such user is known to the store
    #[error("Invalid user: unknown user {0}")]
    Unknown(Uuid),
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be decoded into its domain type
    #[error("Corrupt value in column '{column}': {value}")]
    CorruptValue { column: &'static str, value: String },

    /// Database is locked
    #[error("Database is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// The data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Unknown enum label coming from user input or storage
    #[error("Unknown {kind} '{value}'")]
    UnknownLabel { kind: &'static str, value: String },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(inner, _msg) => {
                if inner.code == rusqlite::ErrorCode::DatabaseLocked
                    || inner.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Reject the nil UUID before any progress is read or written.
pub fn ensure_user(user_id: Uuid) -> Result<Uuid, InvalidUserError> {
    if user_id.is_nil() {
        Err(InvalidUserError::Missing)
    } else {
        Ok(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nil_user_is_rejected() {
        assert_eq!(ensure_user(Uuid::nil()), Err(InvalidUserError::Missing));
        let id = Uuid::new_v4();
        assert_eq!(ensure_user(id), Ok(id));
    }

    #[test]
    fn busy_sqlite_maps_to_locked() {
        let err = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(DatabaseError::from(err), DatabaseError::Locked));
    }
}
