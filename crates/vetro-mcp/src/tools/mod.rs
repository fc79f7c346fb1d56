//! The fixed tool menu.
//!
//! Tools are a static registry, not generated: the surface is deliberately
//! small and every entry is read-only. Each tool either returns a JSON
//! payload (with compacted result data) or a [`ToolError`] that the server
//! renders as the structured error payload.

pub mod project;
pub mod query;
pub mod schema;
pub mod script;
pub mod search;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use vetro_db::DbError;
use vetro_guard::GuardError;
use vetro_sandbox::SandboxError;
use vetro_toon::ToonError;

use crate::hints::enhance_error;
use crate::protocol::{ToolAnnotations, ToolDefinition};
use crate::state::ServerState;

/// Terminal failure of one tool invocation. No retries, no partial silent
/// success; the kind and message travel to the caller, internals do not.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error(transparent)]
    Validation(#[from] GuardError),

    #[error(transparent)]
    Execution(#[from] DbError),

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Encoding(#[from] ToonError),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
}

impl ToolError {
    /// Stable machine-readable kind for the error payload.
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::Validation(e) => e.kind(),
            ToolError::Execution(e) => e.kind(),
            ToolError::Sandbox(e) => e.kind(),
            ToolError::Encoding(e) => e.kind(),
            ToolError::InvalidArguments(_) => "invalid_arguments",
        }
    }

    /// The structured error payload returned to the caller.
    pub fn payload(&self) -> Value {
        let message = match self {
            ToolError::Execution(e) => enhance_error(&e.to_string()),
            other => other.to_string(),
        };
        json!({ "error": { "kind": self.kind(), "message": message } })
    }
}

/// Route a tool call to its implementation.
pub async fn dispatch(
    state: &ServerState,
    name: &str,
    arguments: Value,
) -> Result<Value, ToolError> {
    match name {
        "query_database" => query::query_database(state, arguments).await,
        "get_schema" => schema::get_schema(state, arguments).await,
        "describe_table" => schema::describe_table(state, arguments).await,
        "search_messages" => search::search_messages(state, arguments).await,
        "search_tasks" => search::search_tasks(state, arguments).await,
        "project_summary" => project::project_summary(state, arguments).await,
        "project_dashboard" => project::project_dashboard(state, arguments).await,
        "run_script" => script::run_script(state, arguments).await,
        other => Err(ToolError::InvalidArguments(format!(
            "unknown tool: {other}"
        ))),
    }
}

/// Deserialize tool arguments, surfacing serde failures as invalid-argument
/// errors.
pub(crate) fn parse_args<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}

/// Escape a string for interpolation into a composed SQL literal.
pub(crate) fn sql_quote(value: &str) -> String {
    value.replace('\'', "''")
}

/// Validate, execute and compact a composed query: the shared exit path of
/// every search/summary tool.
pub(crate) async fn run_compacted(state: &ServerState, sql: &str) -> Result<Value, ToolError> {
    let statement = state.guard.validate(sql)?;
    let database = state.database()?;
    let limits = &state.config.limits;

    let mut result = database.execute(&statement, limits).await?;
    let cells_clamped =
        vetro_toon::clamp_result(&mut result, limits.max_cell_chars, limits.cell_preview_chars);
    let encoding = vetro_toon::encode(&result, limits.byte_cap)?;

    Ok(json!({
        "data": encoding.text,
        "meta": {
            "query_time_ms": result.elapsed_ms,
            "total_rows": encoding.rows_total,
            "rows_shown": encoding.rows_emitted,
            "truncated": encoding.truncated,
            "cells_clamped": cells_clamped,
        }
    }))
}

/// The static tool registry.
pub fn definitions() -> Vec<ToolDefinition> {
    let read_only = Some(ToolAnnotations {
        read_only: Some(true),
    });

    vec![
        ToolDefinition {
            name: "query_database".to_string(),
            description: Some(
                "Execute a read-only SQL query. Only SELECT/WITH statements are accepted. \
                 Results come back in TOON (compact tabular) form by default, with \
                 execution metadata and explicit truncation markers."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "SQL SELECT query" },
                    "format": { "type": "string", "enum": ["toon", "json"], "description": "Output format (default toon)" },
                    "include_stats": { "type": "boolean", "description": "Include per-column statistics" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 1000, "description": "Appended as LIMIT when the query has none" },
                    "full_output": { "type": "boolean", "description": "Disable row truncation (byte cap still applies)" }
                },
                "required": ["query"]
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "get_schema".to_string(),
            description: Some(
                "Database schema in a compact form: one line per table with column \
                 types, primary keys and foreign key references."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "schema": { "type": "string", "description": "Restrict to one schema" },
                    "table": { "type": "string", "description": "Restrict to one table" }
                }
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "describe_table".to_string(),
            description: Some(
                "Table overview: columns, sample rows, total row count and column \
                 statistics in one call."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "schema": { "type": "string" },
                    "table": { "type": "string" },
                    "sample_rows": { "type": "integer", "minimum": 1, "maximum": 10, "description": "Sample rows to include (default 3)" }
                },
                "required": ["schema", "table"]
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "search_messages".to_string(),
            description: Some(
                "Search email messages with attachment filtering.".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "subject": { "type": "string", "description": "Case-insensitive partial subject match" },
                    "from_email": { "type": "string", "description": "Exact sender email" },
                    "has_attachment": { "type": "boolean" },
                    "min_attachment_size": { "type": "integer", "description": "Minimum total attachment bytes" },
                    "min_attachments": { "type": "integer" },
                    "attachment_type": { "type": "string", "description": "e.g. 'pdf', 'xlsx'" },
                    "label": { "type": "string", "description": "Label name filter" },
                    "search_text": { "type": "string", "description": "Search subject and body" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 }
                }
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "search_tasks".to_string(),
            description: Some("Search tasks with filters.".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_name": { "type": "string", "description": "Case-insensitive partial project match" },
                    "status": { "type": "string" },
                    "assignee_email": { "type": "string" },
                    "search_text": { "type": "string", "description": "Search name and description" },
                    "tag": { "type": "string" },
                    "overdue_only": { "type": "boolean" },
                    "limit": { "type": "integer", "minimum": 1, "maximum": 200 }
                }
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "project_summary".to_string(),
            description: Some(
                "Project info with task counts by status, overdue count and last \
                 activity."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "integer" },
                    "project_name": { "type": "string", "description": "Case-insensitive partial match" }
                }
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "project_dashboard".to_string(),
            description: Some(
                "Project dashboard: task stats plus recent tasks, messages, files, \
                 key contacts and a combined activity feed."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "project_id": { "type": "integer" },
                    "project_name": { "type": "string" }
                }
            }),
            annotations: read_only.clone(),
        },
        ToolDefinition {
            name: "run_script".to_string(),
            description: Some(
                "Run a Python analysis script in an isolated sandbox. \
                 db_query(\"SELECT ...\") with a string literal is pre-executed and \
                 its rows bound into the script; math, json, re, datetime, Counter \
                 and defaultdict are available; print() output is captured; the \
                 last expression is the result. No network, filesystem or imports."
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "code": { "type": "string", "description": "Python code to execute" },
                    "timeout_seconds": { "type": "integer", "minimum": 1, "maximum": 30, "description": "Max execution time (default 10)" }
                },
                "required": ["code"]
            }),
            annotations: read_only,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eight_tools_registered() {
        let defs = definitions();
        assert_eq!(defs.len(), 8);
        let names: Vec<&str> = defs.iter().map(|d| d.name.as_str()).collect();
        for expected in [
            "query_database",
            "get_schema",
            "describe_table",
            "search_messages",
            "search_tasks",
            "project_summary",
            "project_dashboard",
            "run_script",
        ] {
            assert!(names.contains(&expected), "missing tool {expected}");
        }
    }

    #[test]
    fn test_all_tools_are_read_only() {
        for def in definitions() {
            assert_eq!(
                def.annotations.as_ref().and_then(|a| a.read_only),
                Some(true),
                "{} must be read-only",
                def.name
            );
        }
    }

    #[test]
    fn test_sql_quote() {
        assert_eq!(sql_quote("O'Brien"), "O''Brien");
        assert_eq!(sql_quote("plain"), "plain");
    }

    #[test]
    fn test_error_payload_shape() {
        let err = ToolError::InvalidArguments("missing field".to_string());
        let payload = err.payload();
        assert_eq!(payload["error"]["kind"], "invalid_arguments");
        assert!(payload["error"]["message"]
            .as_str()
            .unwrap()
            .contains("missing field"));
    }
}
