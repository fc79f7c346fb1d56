//! # vetro-core
//!
//! Shared types and configuration for the Vetro read-only database gateway.
//!
//! Vetro exposes a relational database to AI agents through a fixed menu of
//! MCP tools. This crate holds what every other crate needs:
//!
//! - The result row model ([`Column`], [`CellValue`], [`QueryResult`])
//! - The configuration layer ([`VetroConfig`] and its sections), loaded once
//!   at process start and immutable afterwards

pub mod config;
pub mod value;

pub use config::{
    ConfigError, ExecutionLimits, McpConfig, SandboxConfig, Transport, UpstreamConfig, VetroConfig,
};
pub use value::{CellValue, Column, QueryResult};
