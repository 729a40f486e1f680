//! Storage error type and its mapping onto [`CoreError`].

use vidgit_core::error::CoreError;

/// Errors raised by any [`Store`](crate::Store) implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A domain rule enforced at the storage boundary (missing rows,
    /// non-head reverts, empty history).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A persisted row could not be turned back into a domain value.
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Core(core) => core,
            StoreError::Database(sqlx::Error::RowNotFound) => CoreError::NotFound {
                entity: "Row",
                id: "unknown".to_string(),
            },
            StoreError::Database(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23505") =>
            {
                let constraint = db_err.constraint().unwrap_or("unknown");
                CoreError::Conflict(format!(
                    "Duplicate value violates unique constraint: {constraint}"
                ))
            }
            StoreError::Database(sqlx::Error::Database(db_err))
                if db_err.code().as_deref() == Some("23503") =>
            {
                let constraint = db_err.constraint().unwrap_or("unknown");
                CoreError::Validation(format!(
                    "Referenced row does not exist: {constraint}"
                ))
            }
            StoreError::Database(other) => {
                tracing::error!(error = %other, "Database error");
                CoreError::Internal(format!("database error: {other}"))
            }
            StoreError::Corrupt(msg) => {
                tracing::error!(error = %msg, "Corrupt row");
                CoreError::Internal(msg)
            }
        }
    }
}
