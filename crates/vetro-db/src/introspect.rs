//! Schema introspection.
//!
//! Walks `information_schema` for the configured schema allowlist and
//! renders the compact one-line-per-table form the schema tools return:
//!
//! ```text
//! # public
//!
//! **projects**: id int pk, name text, owner_id int (→users.id)
//! ```

use std::collections::HashMap;

use sqlx::{PgPool, Row};

use crate::error::DbError;

/// Introspected schema snapshot.
#[derive(Debug, Clone, Default)]
pub struct SchemaInfo {
    pub tables: Vec<TableInfo>,
}

/// One table or view.
#[derive(Debug, Clone)]
pub struct TableInfo {
    pub schema: String,
    pub name: String,
    pub columns: Vec<ColumnInfo>,
    /// Primary key columns in ordinal order.
    pub primary_key: Vec<String>,
    /// Foreign keys: column name -> "ref_table.ref_column".
    pub foreign_keys: HashMap<String, String>,
}

/// One column.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub udt_name: Option<String>,
    pub nullable: bool,
    pub max_length: Option<i32>,
}

impl SchemaInfo {
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    pub fn column_count(&self) -> usize {
        self.tables.iter().map(|t| t.columns.len()).sum()
    }
}

impl TableInfo {
    /// Full detail rendering for `describe_table`.
    pub fn to_json(&self) -> serde_json::Value {
        let columns: Vec<serde_json::Value> = self
            .columns
            .iter()
            .map(|c| {
                let mut obj = serde_json::json!({
                    "name": c.name,
                    "type": abbrev_type(&c.data_type, c.udt_name.as_deref()),
                    "nullable": c.nullable,
                });
                if self.primary_key.contains(&c.name) {
                    obj["pk"] = serde_json::json!(true);
                }
                if let Some(fk) = self.foreign_keys.get(&c.name) {
                    obj["fk"] = serde_json::json!(fk);
                }
                obj
            })
            .collect();
        serde_json::json!({
            "schema": self.schema,
            "table": self.name,
            "columns": columns,
        })
    }
}

/// Introspect the tables and views visible in the given schemas, optionally
/// restricted to a single table.
pub async fn introspect(
    pool: &PgPool,
    schemas: &[String],
    table: Option<&str>,
) -> Result<SchemaInfo, DbError> {
    let schemas: Vec<String> = schemas.to_vec();

    let col_rows = sqlx::query(
        r#"
        select t.table_schema, t.table_name, c.column_name, c.data_type, c.udt_name,
               c.is_nullable, c.character_maximum_length
        from information_schema.tables t
        join information_schema.columns c
          on t.table_schema = c.table_schema and t.table_name = c.table_name
        where t.table_schema = any($1)
          and t.table_type in ('BASE TABLE', 'VIEW')
          and ($2::text is null or t.table_name = $2)
        order by t.table_schema, t.table_name, c.ordinal_position
        "#,
    )
    .bind(&schemas)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| DbError::Execute(e.to_string()))?;

    let pk_rows = sqlx::query(
        r#"
        select tc.table_schema, tc.table_name, kcu.column_name
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        where tc.constraint_type = 'PRIMARY KEY'
          and tc.table_schema = any($1)
          and ($2::text is null or tc.table_name = $2)
        order by tc.table_schema, tc.table_name, kcu.ordinal_position
        "#,
    )
    .bind(&schemas)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| DbError::Execute(e.to_string()))?;

    let fk_rows = sqlx::query(
        r#"
        select tc.table_schema, tc.table_name, kcu.column_name,
               ccu.table_name as ref_table, ccu.column_name as ref_column
        from information_schema.table_constraints tc
        join information_schema.key_column_usage kcu
          on tc.constraint_name = kcu.constraint_name
         and tc.table_schema = kcu.table_schema
        join information_schema.constraint_column_usage ccu
          on ccu.constraint_name = tc.constraint_name
         and ccu.table_schema = tc.table_schema
        where tc.constraint_type = 'FOREIGN KEY'
          and tc.table_schema = any($1)
          and ($2::text is null or tc.table_name = $2)
        "#,
    )
    .bind(&schemas)
    .bind(table)
    .fetch_all(pool)
    .await
    .map_err(|e| DbError::Execute(e.to_string()))?;

    let mut pk_map: HashMap<(String, String), Vec<String>> = HashMap::new();
    for row in pk_rows {
        let key = (row.get("table_schema"), row.get("table_name"));
        pk_map.entry(key).or_default().push(row.get("column_name"));
    }

    let mut fk_map: HashMap<(String, String), HashMap<String, String>> = HashMap::new();
    for row in fk_rows {
        let key = (row.get("table_schema"), row.get("table_name"));
        let column: String = row.get("column_name");
        let ref_table: String = row.get("ref_table");
        let ref_column: String = row.get("ref_column");
        fk_map
            .entry(key)
            .or_default()
            .insert(column, format!("{ref_table}.{ref_column}"));
    }

    let mut tables: Vec<TableInfo> = Vec::new();
    for row in col_rows {
        let schema: String = row.get("table_schema");
        let name: String = row.get("table_name");
        let nullable: String = row.get("is_nullable");

        let needs_new = tables
            .last()
            .map(|t| t.schema != schema || t.name != name)
            .unwrap_or(true);
        if needs_new {
            let key = (schema.clone(), name.clone());
            tables.push(TableInfo {
                schema: schema.clone(),
                name: name.clone(),
                columns: Vec::new(),
                primary_key: pk_map.remove(&key).unwrap_or_default(),
                foreign_keys: fk_map.remove(&key).unwrap_or_default(),
            });
        }
        if let Some(current) = tables.last_mut() {
            current.columns.push(ColumnInfo {
                name: row.get("column_name"),
                data_type: row.get("data_type"),
                udt_name: row.get("udt_name"),
                nullable: nullable == "YES",
                max_length: row.get("character_maximum_length"),
            });
        }
    }

    Ok(SchemaInfo { tables })
}

/// Render the compact schema text, grouped by schema.
pub fn render_compact(info: &SchemaInfo) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut current_schema: Option<&str> = None;

    for table in &info.tables {
        if current_schema != Some(table.schema.as_str()) {
            if current_schema.is_some() {
                out.push(String::new());
            }
            out.push(format!("# {}", table.schema));
            out.push(String::new());
            current_schema = Some(table.schema.as_str());
        }

        let composite_pk = table.primary_key.len() > 1;
        let cols: Vec<String> = table
            .columns
            .iter()
            .map(|col| {
                let mut ty = abbrev_type(&col.data_type, col.udt_name.as_deref());
                if let Some(len) = col.max_length {
                    ty.push_str(&format!("({len})"));
                }
                let mut rendered = format!("{} {}", col.name, ty);
                if !composite_pk && table.primary_key.first() == Some(&col.name) {
                    rendered.push_str(" pk");
                }
                if let Some(fk) = table.foreign_keys.get(&col.name) {
                    rendered.push_str(&format!(" (→{fk})"));
                }
                rendered
            })
            .collect();

        let mut line = format!("**{}**: {}", table.name, cols.join(", "));
        if composite_pk {
            line.push_str(&format!(" [pk: {}]", table.primary_key.join(", ")));
        }
        out.push(line);
    }

    out.join("\n")
}

/// Abbreviate a Postgres type name for the compact rendering.
pub fn abbrev_type(data_type: &str, udt_name: Option<&str>) -> String {
    if data_type == "ARRAY"
        && let Some(udt) = udt_name
    {
        let base = udt.trim_start_matches('_');
        return format!("{}[]", abbrev_scalar(base));
    }
    if data_type == "USER-DEFINED"
        && let Some(udt) = udt_name
    {
        return udt.to_string();
    }
    abbrev_scalar(data_type)
}

fn abbrev_scalar(pg_type: &str) -> String {
    match pg_type {
        "integer" | "int4" => "int",
        "bigint" | "int8" => "bigint",
        "smallint" | "int2" => "smallint",
        "numeric" => "decimal",
        "real" | "float4" => "float",
        "double precision" | "float8" => "double",
        "boolean" | "bool" => "bool",
        "character varying" | "varchar" => "varchar",
        "character" | "bpchar" => "char",
        "timestamp without time zone" | "timestamp" => "ts",
        "timestamp with time zone" | "timestamptz" => "tstz",
        "bytea" => "bytes",
        other => other,
    }
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_schema() -> SchemaInfo {
        SchemaInfo {
            tables: vec![
                TableInfo {
                    schema: "public".into(),
                    name: "projects".into(),
                    columns: vec![
                        ColumnInfo {
                            name: "id".into(),
                            data_type: "integer".into(),
                            udt_name: Some("int4".into()),
                            nullable: false,
                            max_length: None,
                        },
                        ColumnInfo {
                            name: "name".into(),
                            data_type: "character varying".into(),
                            udt_name: Some("varchar".into()),
                            nullable: false,
                            max_length: Some(255),
                        },
                        ColumnInfo {
                            name: "owner_id".into(),
                            data_type: "integer".into(),
                            udt_name: Some("int4".into()),
                            nullable: true,
                            max_length: None,
                        },
                    ],
                    primary_key: vec!["id".into()],
                    foreign_keys: HashMap::from([("owner_id".into(), "users.id".into())]),
                },
                TableInfo {
                    schema: "teamwork".into(),
                    name: "task_tags".into(),
                    columns: vec![
                        ColumnInfo {
                            name: "task_id".into(),
                            data_type: "integer".into(),
                            udt_name: Some("int4".into()),
                            nullable: false,
                            max_length: None,
                        },
                        ColumnInfo {
                            name: "tag_id".into(),
                            data_type: "integer".into(),
                            udt_name: Some("int4".into()),
                            nullable: false,
                            max_length: None,
                        },
                    ],
                    primary_key: vec!["task_id".into(), "tag_id".into()],
                    foreign_keys: HashMap::new(),
                },
            ],
        }
    }

    #[test]
    fn test_render_compact() {
        let text = render_compact(&sample_schema());
        assert!(text.contains("# public"));
        assert!(text.contains(
            "**projects**: id int pk, name varchar(255), owner_id int (→users.id)"
        ));
        assert!(text.contains("# teamwork"));
        assert!(text.contains("**task_tags**: task_id int, tag_id int [pk: task_id, tag_id]"));
    }

    #[test]
    fn test_abbrev_type() {
        assert_eq!(abbrev_type("integer", Some("int4")), "int");
        assert_eq!(abbrev_type("timestamp with time zone", None), "tstz");
        assert_eq!(abbrev_type("ARRAY", Some("_text")), "text[]");
        assert_eq!(abbrev_type("USER-DEFINED", Some("mood")), "mood");
        assert_eq!(abbrev_type("uuid", Some("uuid")), "uuid");
    }

    #[test]
    fn test_counts() {
        let schema = sample_schema();
        assert_eq!(schema.table_count(), 2);
        assert_eq!(schema.column_count(), 5);
    }
}
