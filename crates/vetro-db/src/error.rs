//! Error types for the database crate.

use thiserror::Error;

/// Errors surfaced by query execution. The underlying driver message is
/// preserved for diagnostics; it is never swallowed or retried.
#[derive(Debug, Error)]
pub enum DbError {
    /// Failed to connect or to check a connection out of the pool.
    #[error("database connection failed: {0}")]
    Connect(String),

    /// Statement exceeded the configured timeout.
    #[error("query exceeded the {timeout_ms}ms statement timeout")]
    Timeout { timeout_ms: u64 },

    /// Database-level execution failure (syntax surfaced at execution time,
    /// permission denial, connection loss mid-query, ...).
    #[error("query failed: {0}")]
    Execute(String),
}

impl DbError {
    /// Stable machine-readable kind, used in the protocol error payload.
    pub fn kind(&self) -> &'static str {
        "execution_error"
    }

    /// Classify a driver error, promoting server-side statement_timeout
    /// cancellations (SQLSTATE 57014) to the timeout variant.
    pub fn from_sqlx(err: sqlx::Error, timeout_ms: u64) -> Self {
        if let sqlx::Error::Database(db_err) = &err
            && db_err.code().as_deref() == Some("57014")
        {
            return DbError::Timeout { timeout_ms };
        }
        match err {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
                DbError::Connect(err.to_string())
            }
            other => DbError::Execute(other.to_string()),
        }
    }
}
