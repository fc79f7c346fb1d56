//! Connection pool and bounded query execution.

use std::time::{Duration, Instant};

use bigdecimal::ToPrimitive;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use futures::TryStreamExt;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::types::BigDecimal;
use sqlx::{Column as _, PgPool, Row, TypeInfo};

use vetro_core::{CellValue, Column, ExecutionLimits, QueryResult, UpstreamConfig};
use vetro_guard::ReadStatement;

use crate::error::DbError;

/// Handle to the upstream database.
///
/// Cheap to clone; all clones share one pool. Each execution checks out a
/// single connection for its whole duration and returns it on every path.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect using the configured credentials and pool sizing.
    pub async fn connect(config: &UpstreamConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .min_connections(config.pool.min_connections)
            .max_connections(config.pool.max_connections)
            .acquire_timeout(Duration::from_secs(u64::from(
                config.pool.acquire_timeout_seconds,
            )))
            .idle_timeout(Duration::from_secs(u64::from(
                config.pool.idle_timeout_seconds,
            )))
            .connect(&config.connection_string())
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        tracing::info!(
            min = config.pool.min_connections,
            max = config.pool.max_connections,
            "database pool created"
        );
        Ok(Self { pool })
    }

    /// Wrap an existing pool (used by tests and introspection).
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Execute a validated statement under the given limits.
    ///
    /// The statement timeout is set server-side on the checked-out
    /// connection; a client-side deadline slightly past it is the backstop
    /// for a wedged connection. At most `row_cap` rows are materialized -
    /// one probe row past the cap decides `more_rows` and is dropped.
    pub async fn execute(
        &self,
        statement: &ReadStatement,
        limits: &ExecutionLimits,
    ) -> Result<QueryResult, DbError> {
        let timeout_ms = limits.statement_timeout_ms;
        let backstop = limits.statement_timeout() + Duration::from_millis(500);

        match tokio::time::timeout(backstop, self.execute_inner(statement.as_str(), limits)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout_ms, "query aborted by client-side deadline");
                Err(DbError::Timeout { timeout_ms })
            }
        }
    }

    async fn execute_inner(
        &self,
        sql: &str,
        limits: &ExecutionLimits,
    ) -> Result<QueryResult, DbError> {
        let timeout_ms = limits.statement_timeout_ms;
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DbError::Connect(e.to_string()))?;

        sqlx::query(&format!("SET statement_timeout = {timeout_ms}"))
            .execute(&mut *conn)
            .await
            .map_err(|e| DbError::from_sqlx(e, timeout_ms))?;

        let started = Instant::now();
        let mut stream = sqlx::query(sql).fetch(&mut *conn);

        let mut columns: Vec<Column> = Vec::new();
        let mut rows: Vec<Vec<CellValue>> = Vec::new();
        let mut more_rows = false;

        while let Some(row) = stream
            .try_next()
            .await
            .map_err(|e| DbError::from_sqlx(e, timeout_ms))?
        {
            if columns.is_empty() {
                columns = row
                    .columns()
                    .iter()
                    .map(|c| Column::new(c.name(), c.type_info().name()))
                    .collect();
            }
            if rows.len() == limits.row_cap {
                more_rows = true;
                break;
            }
            rows.push(decode_row(&row));
        }
        drop(stream);

        let elapsed_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            rows = rows.len(),
            more_rows,
            elapsed_ms,
            "query executed"
        );

        Ok(QueryResult {
            columns,
            rows,
            more_rows,
            elapsed_ms,
        })
    }
}

fn decode_row(row: &PgRow) -> Vec<CellValue> {
    (0..row.columns().len())
        .map(|idx| decode_cell(row, idx))
        .collect()
}

/// Decode one cell through a chain of concrete types. Types outside the
/// model (ranges, intervals, custom composites) fall through to NULL.
fn decode_cell(row: &PgRow, idx: usize) -> CellValue {
    if let Ok(v) = row.try_get::<Option<bool>, _>(idx) {
        return v.map(CellValue::Bool).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i16>, _>(idx) {
        return v.map(|v| CellValue::Int(i64::from(v))).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return v.map(|v| CellValue::Int(i64::from(v))).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return v.map(CellValue::Int).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(idx) {
        return v.map(|v| CellValue::Float(f64::from(v))).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return v.map(CellValue::Float).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(idx) {
        return match v {
            Some(d) => d
                .to_f64()
                .map(CellValue::Float)
                .unwrap_or_else(|| CellValue::Text(d.to_string())),
            None => CellValue::Null,
        };
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(idx) {
        return v.map(CellValue::Text).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return v.map(CellValue::Timestamp).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return v
            .map(|ts| CellValue::Timestamp(ts.and_utc()))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<NaiveDate>, _>(idx) {
        return v
            .map(|d| CellValue::Text(d.to_string()))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return v
            .map(|u| CellValue::Text(u.to_string()))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<serde_json::Value>, _>(idx) {
        return v.map(CellValue::Json).unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<String>>, _>(idx) {
        return v
            .map(|items| CellValue::Json(serde_json::json!(items)))
            .unwrap_or(CellValue::Null);
    }
    if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(idx) {
        return v.map(|b| CellValue::Bytes(b.len())).unwrap_or(CellValue::Null);
    }
    CellValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_errors_classify_as_connect() {
        let err = DbError::from_sqlx(sqlx::Error::PoolTimedOut, 30_000);
        assert!(matches!(err, DbError::Connect(_)));
        assert_eq!(err.kind(), "execution_error");
    }

    #[test]
    fn test_row_not_found_classifies_as_execute() {
        let err = DbError::from_sqlx(sqlx::Error::RowNotFound, 30_000);
        assert!(matches!(err, DbError::Execute(_)));
    }
}
