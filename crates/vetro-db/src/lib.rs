//! # vetro-db
//!
//! Bounded query execution against the upstream Postgres database.
//!
//! The [`Database`] owns a connection pool built from [`UpstreamConfig`] and
//! executes statements that already passed the guard, under per-invocation
//! limits: a statement timeout (enforced server-side and client-side) and a
//! row cap (rows are streamed and materialization stops one past the cap, so
//! a runaway query cannot exhaust memory). Schema introspection for the
//! `get_schema`/`describe_table` tools lives in [`introspect`].
//!
//! [`UpstreamConfig`]: vetro_core::UpstreamConfig

pub mod database;
pub mod error;
pub mod introspect;

pub use database::Database;
pub use error::DbError;
pub use introspect::{ColumnInfo, SchemaInfo, TableInfo};

// Re-export for downstream convenience
pub use sqlx::PgPool;
