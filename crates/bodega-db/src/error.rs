//! # Database Error Types
//!
//! Error types for cache store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)     JSON Error (serde_json::Error)          │
//! │       │                              │                                  │
//! │       └──────────────┬───────────────┘                                  │
//! │                      ▼                                                  │
//! │  DbError (this module) ← Adds context and categorization               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ApiError (terminal app) ← Code + message for the shell                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Cache store errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// Database connection failed.
    ///
    /// ## When This Occurs
    /// - Database file can't be created
    /// - File permissions issue
    /// - Disk full
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// A payload could not be encoded or decoded.
    ///
    /// ## When This Occurs
    /// - Stored JSON is corrupt
    /// - Stored JSON no longer matches the current types and no upgrade
    ///   hook covered the change
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Blob was written by a newer build than this one.
    #[error("Blob '{key}' has schema version {found}; this build supports up to {supported}")]
    UnsupportedVersion {
        key: String,
        found: u32,
        supported: u32,
    },

    /// The upgrade hook refused or failed to upgrade a payload.
    #[error("Could not upgrade blob '{key}' from version {from_version}: {reason}")]
    MigrationHookFailed {
        key: String,
        from_version: u32,
        reason: String,
    },

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::Database       → DbError::QueryFailed
/// sqlx::Error::PoolTimedOut   → DbError::PoolExhausted
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::QueryFailed(db_err.message().to_string()),

            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_error_maps_to_serialization() {
        let err: DbError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(matches!(err, DbError::Serialization(_)));
    }

    #[test]
    fn test_unsupported_version_message() {
        let err = DbError::UnsupportedVersion {
            key: "cart".to_string(),
            found: 3,
            supported: 1,
        };
        assert_eq!(
            err.to_string(),
            "Blob 'cart' has schema version 3; this build supports up to 1"
        );
    }
}
