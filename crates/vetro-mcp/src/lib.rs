//! # vetro-mcp
//!
//! MCP (Model Context Protocol) server for Vetro.
//!
//! Exposes the read-only database behind a fixed menu of eight tools:
//!
//! | Tool | Description |
//! |------|-------------|
//! | `query_database` | Guard-validated raw SQL, compacted results |
//! | `get_schema` | Compact schema introspection |
//! | `describe_table` | Columns + sample rows + stats for one table |
//! | `search_messages` | Parameterized search over the message store |
//! | `search_tasks` | Parameterized search over the task store |
//! | `project_summary` | Per-project task statistics |
//! | `project_dashboard` | Recent activity across all sources |
//! | `run_script` | Sandboxed analysis script with pre-bound query data |
//!
//! ## Request flow
//!
//! ```text
//! AI agent
//!    │  MCP (tools/list, tools/call) over stdio or HTTP
//!    ▼
//! ┌───────────────────┐
//! │ Vetro MCP server  │
//! │ 1. Validate SQL   │ ← vetro-guard
//! │ 2. Execute bounded│ ← vetro-db
//! │ 3. (run_script:   │
//! │    sandbox)       │ ← vetro-sandbox
//! │ 4. Compact + trim │ ← vetro-toon
//! └─────────┬─────────┘
//!           ▼
//!   Upstream Postgres (read-only credential)
//! ```
//!
//! Every tool either returns a compacted payload or a structured error
//! `{ error: { kind, message } }`; all errors are terminal for the
//! invocation and carry no host internals.

pub mod error;
pub mod hints;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod state;
pub mod tools;

pub use error::McpError;
pub use protocol::{
    CallToolParams, JsonRpcRequest, JsonRpcResponse, ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use state::ServerState;
pub use tools::ToolError;
