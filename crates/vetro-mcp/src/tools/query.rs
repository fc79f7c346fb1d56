//! The raw SQL tool.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde_json::{json, Value};

use vetro_core::{CellValue, ExecutionLimits, QueryResult};

use crate::state::ServerState;
use crate::tools::{parse_args, ToolError};

/// Hard ceiling for the `limit` argument.
const MAX_LIMIT: u64 = 1000;

#[derive(Debug, Deserialize)]
struct QueryArgs {
    query: String,
    #[serde(default = "default_format")]
    format: OutputFormat,
    #[serde(default)]
    include_stats: bool,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    full_output: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum OutputFormat {
    Toon,
    Json,
}

fn default_format() -> OutputFormat {
    OutputFormat::Toon
}

/// Execute a caller-supplied SQL statement: guard, bounded execution, cell
/// clamping, compaction.
pub async fn query_database(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: QueryArgs = parse_args(arguments)?;
    let limits = &state.config.limits;

    // Append LIMIT before validation so the guard sees the final text.
    let mut sql = args.query.trim().trim_end_matches(';').to_string();
    if !args.full_output
        && let Some(limit) = args.limit
        && !sql.to_uppercase().contains("LIMIT")
    {
        sql = format!("{sql} LIMIT {}", limit.min(MAX_LIMIT));
    }

    let statement = state.guard.validate(&sql)?;
    tracing::debug!(tables = ?statement.tables(), "query accepted");

    let database = state.database()?;
    let effective_limits = if args.full_output {
        ExecutionLimits {
            row_cap: usize::MAX,
            ..limits.clone()
        }
    } else {
        limits.clone()
    };

    let mut result = database.execute(&statement, &effective_limits).await?;
    let cells_clamped =
        vetro_toon::clamp_result(&mut result, limits.max_cell_chars, limits.cell_preview_chars);

    let mut meta = json!({
        "query_time_ms": result.elapsed_ms,
        "total_rows": result.row_count(),
        "cells_clamped": cells_clamped,
    });
    if args.include_stats && !result.rows.is_empty() {
        meta["columns"] = compute_column_stats(&result);
    }

    match args.format {
        OutputFormat::Toon => {
            let encoding = vetro_toon::encode(&result, limits.byte_cap)?;
            meta["rows_shown"] = json!(encoding.rows_emitted);
            meta["truncated"] = json!(encoding.truncated);
            Ok(json!({ "data": encoding.text, "meta": meta }))
        }
        OutputFormat::Json => {
            let (rows, truncated) = fit_json_rows(&result, limits.byte_cap);
            meta["rows_shown"] = json!(rows.len());
            meta["truncated"] = json!(truncated || result.more_rows);
            Ok(json!({ "rows": rows, "meta": meta }))
        }
    }
}

/// Drop trailing rows until the JSON rendering fits the byte cap. Same
/// policy as the TOON encoder: whole rows only.
fn fit_json_rows(result: &QueryResult, byte_cap: usize) -> (Vec<Value>, bool) {
    let mut rows = result.rows_as_json();
    let total = rows.len();
    while !rows.is_empty() {
        let size = serde_json::to_string(&rows).map(|s| s.len()).unwrap_or(0);
        if size <= byte_cap {
            break;
        }
        rows.pop();
    }
    let truncated = rows.len() < total;
    (rows, truncated)
}

/// Basic per-column statistics: null counts, numeric min/max, distinct
/// strings with a small sample.
fn compute_column_stats(result: &QueryResult) -> Value {
    let mut stats = BTreeMap::new();

    for (idx, column) in result.columns.iter().enumerate() {
        let mut non_null = 0usize;
        let mut numeric_min: Option<f64> = None;
        let mut numeric_max: Option<f64> = None;
        let mut strings: BTreeSet<&str> = BTreeSet::new();

        for row in &result.rows {
            let cell = &row[idx];
            if cell.is_null() {
                continue;
            }
            non_null += 1;
            match cell {
                CellValue::Int(v) => {
                    let v = *v as f64;
                    numeric_min = Some(numeric_min.map_or(v, |m| m.min(v)));
                    numeric_max = Some(numeric_max.map_or(v, |m| m.max(v)));
                }
                CellValue::Float(v) => {
                    numeric_min = Some(numeric_min.map_or(*v, |m| m.min(*v)));
                    numeric_max = Some(numeric_max.map_or(*v, |m| m.max(*v)));
                }
                CellValue::Text(s) => {
                    strings.insert(s.as_str());
                }
                _ => {}
            }
        }

        let mut col_stats = json!({
            "non_null": non_null,
            "null": result.rows.len() - non_null,
        });
        if let (Some(min), Some(max)) = (numeric_min, numeric_max) {
            col_stats["min"] = json!(min);
            col_stats["max"] = json!(max);
        }
        if !strings.is_empty() {
            col_stats["unique"] = json!(strings.len());
            if strings.len() <= 5 {
                col_stats["sample_values"] = json!(strings.iter().collect::<Vec<_>>());
            }
        }
        stats.insert(column.name.clone(), col_stats);
    }

    json!(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetro_core::Column;

    fn sample_result() -> QueryResult {
        QueryResult {
            columns: vec![
                Column::new("id", "INT8"),
                Column::new("status", "TEXT"),
                Column::new("score", "FLOAT8"),
            ],
            rows: vec![
                vec![
                    CellValue::Int(1),
                    CellValue::Text("open".into()),
                    CellValue::Float(1.5),
                ],
                vec![
                    CellValue::Int(2),
                    CellValue::Text("done".into()),
                    CellValue::Null,
                ],
                vec![
                    CellValue::Int(5),
                    CellValue::Text("open".into()),
                    CellValue::Float(3.25),
                ],
            ],
            more_rows: false,
            elapsed_ms: 1,
        }
    }

    #[test]
    fn test_column_stats() {
        let stats = compute_column_stats(&sample_result());
        assert_eq!(stats["id"]["non_null"], 3);
        assert_eq!(stats["id"]["min"], 1.0);
        assert_eq!(stats["id"]["max"], 5.0);
        assert_eq!(stats["score"]["null"], 1);
        assert_eq!(stats["status"]["unique"], 2);
        assert_eq!(stats["status"]["sample_values"], json!(["done", "open"]));
    }

    #[test]
    fn test_fit_json_rows_drops_whole_rows() {
        let result = sample_result();
        let full_size = serde_json::to_string(&result.rows_as_json()).unwrap().len();

        let (rows, truncated) = fit_json_rows(&result, full_size);
        assert_eq!(rows.len(), 3);
        assert!(!truncated);

        let (rows, truncated) = fit_json_rows(&result, full_size - 1);
        assert_eq!(rows.len(), 2);
        assert!(truncated);
    }
}
