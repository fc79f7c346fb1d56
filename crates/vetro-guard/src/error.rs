//! Error types for the guard crate.

use thiserror::Error;

/// Reasons a statement is rejected.
#[derive(Debug, Error)]
pub enum GuardError {
    /// SQL parsing failed. Unparseable input is rejected, not guessed at.
    #[error("failed to parse SQL: {0}")]
    ParseError(String),

    /// Empty submission.
    #[error("empty statement")]
    EmptyStatement,

    /// More than one statement in the submission (semicolon chaining).
    #[error("expected a single statement, found {count}")]
    MultipleStatements { count: usize },

    /// A non-read statement kind was submitted.
    #[error("{verb} statements are not allowed on a read-only connection")]
    StatementNotAllowed { verb: String },

    /// SELECT ... INTO creates a table.
    #[error("SELECT INTO is not allowed on a read-only connection")]
    SelectInto,

    /// FOR UPDATE / FOR SHARE take row locks.
    #[error("locking clauses (FOR UPDATE / FOR SHARE) are not allowed")]
    LockingClause,

    /// A denylisted administrative or filesystem function was referenced.
    #[error("function {name} is not allowed")]
    FunctionDenied { name: String },
}

impl GuardError {
    /// Stable machine-readable kind, used in the protocol error payload.
    pub fn kind(&self) -> &'static str {
        "validation_rejected"
    }
}
