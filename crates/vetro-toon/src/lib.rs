//! # vetro-toon
//!
//! Compacts query results into TOON (token-oriented object notation), the
//! dense text form Vetro returns to model consumers. Column headers are
//! emitted once, rows once per line, and the whole encoding is kept inside a
//! byte cap by dropping rows from the tail - never by splitting a row.
//!
//! The format is fully specified and round-trippable:
//!
//! ```text
//! rows[3/20+]{id,name,note}:
//!   1,alpha,∅
//!   2,"with,comma","line\nbreak"
//!   3,gamma,""
//!   # truncated: 17 rows omitted
//! ```
//!
//! - `rows[emitted/total]` - counts; `total` carries a trailing `+` when the
//!   executor hit its row cap and more rows exist upstream.
//! - `∅` bare is SQL NULL; `true`/`false` bare are booleans; numbers are
//!   bare. Everything ambiguous is double-quoted with `""`, `\\`, `\n`, `\r`,
//!   `\t` escapes, so arbitrary strings - including the delimiters
//!   themselves - survive a round trip exactly.
//! - The trailing `# truncated` marker appears whenever content was dropped.
//!
//! A row that cannot fit inside the byte cap at all is reported as
//! [`ToonError::RowTooLarge`], never emitted partially.

pub mod clamp;
pub mod decode;
pub mod encode;
pub mod error;

pub use clamp::{clamp_cell, clamp_result};
pub use decode::{decode, Decoded};
pub use encode::{encode, CompactEncoding};
pub use error::ToonError;

/// NULL cell marker.
pub(crate) const NULL_MARK: &str = "∅";
/// Leading characters of the truncation marker line.
pub(crate) const MARKER_PREFIX: &str = "  # truncated: ";
