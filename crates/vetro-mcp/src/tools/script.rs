//! The sandboxed script tool.
//!
//! `db_query("...")` string literals in the script are pre-executed here -
//! each one goes through the guard and the bounded executor like any other
//! query - and the rows are bound into the sandbox as the script's only data
//! context. The script itself then runs in an isolated child process.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{json, Value};

use vetro_sandbox::{scan_query_literals, SandboxRequest};

use crate::state::ServerState;
use crate::tools::{parse_args, ToolError};

#[derive(Debug, Deserialize)]
struct RunScriptArgs {
    code: String,
    #[serde(default)]
    timeout_seconds: Option<u64>,
}

/// Execute an analysis script in the sandbox pool.
pub async fn run_script(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: RunScriptArgs = parse_args(arguments)?;
    let timeout_seconds = state.config.sandbox.clamp_timeout(args.timeout_seconds);

    let literals = scan_query_literals(&args.code);
    let max_queries = state.config.sandbox.max_context_queries;
    if literals.len() > max_queries {
        return Err(ToolError::InvalidArguments(format!(
            "too many db_query() calls: {} (max {max_queries})",
            literals.len()
        )));
    }

    let mut context: HashMap<String, Value> = HashMap::new();
    for sql in &literals {
        let statement = state.guard.validate(sql)?;
        let database = state.database()?;
        let result = database.execute(&statement, &state.config.limits).await?;
        context.insert(sql.clone(), Value::Array(result.rows_as_json()));
    }

    tracing::info!(
        code_len = args.code.len(),
        context_queries = context.len(),
        timeout_seconds,
        "run_script"
    );

    let result = state
        .sandbox
        .run(SandboxRequest {
            code: args.code,
            timeout_seconds,
            context,
        })
        .await?;

    Ok(json!({
        "result": result.value,
        "output": result.stdout,
        "meta": {
            "duration_ms": result.duration_ms,
            "stdout_truncated": result.stdout_truncated,
            "context_queries": literals.len(),
        }
    }))
}
