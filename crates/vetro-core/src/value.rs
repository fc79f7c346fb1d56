//! Result row model.
//!
//! A query result is an ordered set of columns plus rows of typed cells.
//! The column set is identical across all rows of one result; row order is
//! the database's return order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for a single result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    /// Database type name as reported by the driver (e.g. "INT8", "TEXT").
    pub type_name: String,
}

impl Column {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// A single cell value from a query result.
///
/// Binary columns are represented by their length only; raw bytes are never
/// shipped to the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
    Json(serde_json::Value),
    Bytes(usize),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Render the cell for JSON responses.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Bool(b) => serde_json::json!(b),
            CellValue::Int(i) => serde_json::json!(i),
            CellValue::Float(f) => serde_json::json!(f),
            CellValue::Text(s) => serde_json::json!(s),
            CellValue::Timestamp(ts) => serde_json::json!(ts.to_rfc3339()),
            CellValue::Json(v) => v.clone(),
            CellValue::Bytes(len) => serde_json::json!(format!("<{} bytes>", len)),
        }
    }
}

/// An executed query's result set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<CellValue>>,
    /// The row cap was hit; the underlying result has more rows.
    pub more_rows: bool,
    /// Wall-clock execution time in milliseconds.
    pub elapsed_ms: u64,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            more_rows: false,
            elapsed_ms: 0,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Rows rendered as JSON objects keyed by column name.
    pub fn rows_as_json(&self) -> Vec<serde_json::Value> {
        self.rows
            .iter()
            .map(|row| {
                let mut obj = serde_json::Map::new();
                for (col, cell) in self.columns.iter().zip(row) {
                    obj.insert(col.name.clone(), cell.to_json());
                }
                serde_json::Value::Object(obj)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_as_json() {
        let result = QueryResult {
            columns: vec![Column::new("id", "INT8"), Column::new("name", "TEXT")],
            rows: vec![
                vec![CellValue::Int(1), CellValue::Text("alpha".into())],
                vec![CellValue::Int(2), CellValue::Null],
            ],
            more_rows: false,
            elapsed_ms: 3,
        };

        let json = result.rows_as_json();
        assert_eq!(json.len(), 2);
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["name"], "alpha");
        assert!(json[1]["name"].is_null());
    }

    #[test]
    fn test_bytes_rendering() {
        assert_eq!(
            CellValue::Bytes(512).to_json(),
            serde_json::json!("<512 bytes>")
        );
    }
}
