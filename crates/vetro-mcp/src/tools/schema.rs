//! Schema exploration tools.

use serde::Deserialize;
use serde_json::{json, Value};

use vetro_db::introspect;

use crate::state::ServerState;
use crate::tools::{parse_args, run_compacted, ToolError};

#[derive(Debug, Deserialize)]
struct GetSchemaArgs {
    #[serde(default)]
    schema: Option<String>,
    #[serde(default)]
    table: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DescribeTableArgs {
    schema: String,
    table: String,
    #[serde(default = "default_sample_rows")]
    sample_rows: u32,
}

fn default_sample_rows() -> u32 {
    3
}

/// Identifiers that reach composed SQL are restricted to word characters.
fn check_identifier(name: &str, what: &str) -> Result<(), ToolError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ToolError::InvalidArguments(format!(
            "invalid {what} name: '{name}'"
        )));
    }
    Ok(())
}

fn check_schema_allowed(state: &ServerState, schema: &str) -> Result<(), ToolError> {
    if !state.config.schemas.iter().any(|s| s == schema) {
        return Err(ToolError::InvalidArguments(format!(
            "invalid schema: '{schema}' (valid: {})",
            state.config.schemas.join(", ")
        )));
    }
    Ok(())
}

/// Compact schema rendering, optionally restricted to one schema or table.
pub async fn get_schema(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: GetSchemaArgs = parse_args(arguments)?;

    let schemas: Vec<String> = match &args.schema {
        Some(schema) => {
            check_schema_allowed(state, schema)?;
            vec![schema.clone()]
        }
        None => state.config.schemas.clone(),
    };
    if let Some(table) = &args.table {
        check_identifier(table, "table")?;
    }

    let database = state.database()?;
    let info = introspect::introspect(database.pool(), &schemas, args.table.as_deref()).await?;

    tracing::info!(
        tables = info.table_count(),
        columns = info.column_count(),
        "schema introspected"
    );

    Ok(json!({
        "schema": introspect::render_compact(&info),
        "meta": {
            "tables": info.table_count(),
            "columns": info.column_count(),
        }
    }))
}

/// Table overview: columns, sample rows, row count and query tips.
pub async fn describe_table(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: DescribeTableArgs = parse_args(arguments)?;
    check_schema_allowed(state, &args.schema)?;
    check_identifier(&args.table, "table")?;
    let sample_rows = args.sample_rows.clamp(1, 10);

    let database = state.database()?;
    let info = introspect::introspect(
        database.pool(),
        std::slice::from_ref(&args.schema),
        Some(&args.table),
    )
    .await?;
    let Some(table) = info.tables.first() else {
        return Err(ToolError::InvalidArguments(format!(
            "table not found: {}.{}",
            args.schema, args.table
        )));
    };

    let sample = run_compacted(
        state,
        &format!(
            "SELECT * FROM {}.{} LIMIT {sample_rows}",
            args.schema, args.table
        ),
    )
    .await?;

    let total_rows = scalar_i64(
        state,
        &format!("SELECT COUNT(*) AS total FROM {}.{}", args.schema, args.table),
    )
    .await?;

    let compact_line = introspect::render_compact(&info);
    let mut tips: Vec<&str> = Vec::new();
    if compact_line.contains("created_at") {
        tips.push("ORDER BY created_at DESC for recent records");
    }
    if compact_line.contains("_id") {
        tips.push("JOIN on *_id columns for related data");
    }
    if compact_line.contains("email") {
        tips.push("Filter by email with ILIKE for case-insensitive match");
    }
    if tips.is_empty() {
        tips.push("Use LIMIT to preview data");
        tips.push("Use ILIKE for text search");
    }

    Ok(json!({
        "table": format!("{}.{}", args.schema, args.table),
        "columns": table.to_json(),
        "compact": compact_line,
        "sample": sample["data"],
        "total_rows": total_rows,
        "query_tips": tips.iter().take(3).collect::<Vec<_>>(),
    }))
}

/// Run a query expected to return a single integer cell.
async fn scalar_i64(state: &ServerState, sql: &str) -> Result<Option<i64>, ToolError> {
    let statement = state.guard.validate(sql)?;
    let database = state.database()?;
    let result = database.execute(&statement, &state.config.limits).await?;
    Ok(match result.rows.first().and_then(|row| row.first()) {
        Some(vetro_core::CellValue::Int(v)) => Some(*v),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_identifier() {
        assert!(check_identifier("tasks", "table").is_ok());
        assert!(check_identifier("task_tags", "table").is_ok());
        assert!(check_identifier("tasks; DROP TABLE x", "table").is_err());
        assert!(check_identifier("", "table").is_err());
        assert!(check_identifier("ta-ble", "table").is_err());
    }
}
