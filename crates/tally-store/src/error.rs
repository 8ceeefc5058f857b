//! # Store Error Types
//!
//! Error types for Local Store operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StoreError (this module) ← Adds context and categorization            │
//! │       │                                                                 │
//! │       ├── reads: recovered locally (empty-result fallback + warn)      │
//! │       │                                                                 │
//! │       └── writes: propagate loudly so the caller can warn the user     │
//! │           that the action was not saved                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Local Store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Durable storage cannot be opened at all.
    ///
    /// ## When This Occurs
    /// - Database file cannot be created (permissions, disk full)
    /// - Host environment has no durable-storage capability
    ///
    /// Surfaced once to the UI layer as a degraded-mode notice.
    #[error("Durable storage unavailable: {0}")]
    Unavailable(String),

    /// Record not found in a collection.
    #[error("{collection} record not found: {id}")]
    NotFound { collection: String, id: String },

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Multi-statement transaction failed; nothing was written.
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Pool exhausted (all connections in use).
    #[error("Connection pool exhausted")]
    PoolExhausted,

    /// Record payload could not be serialized for storage.
    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored row could not be decoded back into its record type.
    ///
    /// ## When This Occurs
    /// - Payload written by a newer app version with incompatible fields
    /// - Manual tampering with the database file
    #[error("Stored row is corrupt: {0}")]
    Corrupt(String),

    /// Internal store error.
    #[error("Internal store error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Creates a NotFound error for a collection and id.
    pub fn not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Convert sqlx errors to StoreError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → StoreError::NotFound (context-free)
/// sqlx::Error::PoolTimedOut   → StoreError::PoolExhausted
/// sqlx::Error::PoolClosed     → StoreError::Unavailable
/// sqlx::Error::Database       → StoreError::QueryFailed
/// Other                       → StoreError::Internal
/// ```
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound {
                collection: "unknown".to_string(),
                id: "unknown".to_string(),
            },
            sqlx::Error::Database(db_err) => StoreError::QueryFailed(db_err.message().to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::PoolClosed => StoreError::Unavailable("Pool is closed".to_string()),
            _ => StoreError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::MigrationFailed(err.to_string())
    }
}

impl From<tally_core::CoreError> for StoreError {
    fn from(err: tally_core::CoreError) -> Self {
        match err {
            tally_core::CoreError::Serialization(e) => StoreError::Serialization(e),
            other => StoreError::Internal(other.to_string()),
        }
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::not_found("products", "p-1");
        assert_eq!(err.to_string(), "products record not found: p-1");

        let err = StoreError::Unavailable("no filesystem".to_string());
        assert!(err.to_string().contains("no filesystem"));
    }

    #[test]
    fn test_pool_errors_map_to_categories() {
        let err: StoreError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StoreError::PoolExhausted));

        let err: StoreError = sqlx::Error::PoolClosed.into();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
