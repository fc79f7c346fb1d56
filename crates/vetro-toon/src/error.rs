//! Error types for the TOON crate.

use thiserror::Error;

/// Errors raised while encoding or decoding TOON.
#[derive(Debug, Error)]
pub enum ToonError {
    /// The header plus a single row exceed the byte cap; the row is
    /// unencodable rather than corrupted.
    #[error("a single row ({row_bytes} bytes with header) exceeds the byte cap ({byte_cap})")]
    RowTooLarge { row_bytes: usize, byte_cap: usize },

    /// Malformed TOON text.
    #[error("decode error at line {line}: {message}")]
    Decode { line: usize, message: String },
}

impl ToonError {
    /// Stable machine-readable kind, used in the protocol error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ToonError::RowTooLarge { .. } => "encoding_overflow",
            ToonError::Decode { .. } => "encoding_overflow",
        }
    }
}
