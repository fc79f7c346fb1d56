//! # vetro-guard
//!
//! Read-only statement validation for the Vetro gateway.
//!
//! Every SQL string submitted by a caller passes through [`StatementGuard`]
//! before it is allowed anywhere near a connection. The guard parses the text
//! with sqlparser's Postgres dialect and accepts it only when the whole
//! submission is a single pure read. Anything else - mutating statements,
//! DDL, statement chaining, locking reads, calls into the administrative
//! function surface, or text that does not parse at all - is rejected with a
//! reason.
//!
//! This is defense in depth: the upstream credential is expected to be
//! read-only, and a rejection here is always surfaced to the caller rather
//! than silently downgraded.

pub mod error;
pub mod validator;

pub use error::GuardError;
pub use validator::{ReadStatement, StatementGuard};
