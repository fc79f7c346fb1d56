//! SQL statement validation.
//!
//! The guard parses a submission with the Postgres dialect and accepts it
//! only when it is a single pure read. Classification happens on the AST, so
//! comment tricks and quoting games either parse into something inspectable
//! or fail the parse and are rejected.

use sqlparser::ast::{Query, SetExpr, Statement, TableFactor, TableWithJoins};
use sqlparser::dialect::PostgreSqlDialect;
use sqlparser::parser::Parser;

use crate::error::GuardError;

/// Administrative, filesystem and signaling functions that must never be
/// reachable through the tool surface, even on a read-only credential.
const DENIED_FUNCTIONS: &[&str] = &[
    "pg_sleep",
    "pg_sleep_for",
    "pg_sleep_until",
    "pg_terminate_backend",
    "pg_cancel_backend",
    "pg_reload_conf",
    "pg_rotate_logfile",
    "set_config",
    "pg_stat_file",
    "pg_switch_wal",
    "pg_create_restore_point",
];

/// Denied by prefix: large-object I/O, dblink, file and directory access,
/// advisory locks.
const DENIED_PREFIXES: &[&str] = &["lo_", "dblink", "pg_read_", "pg_ls_", "pg_advisory_"];

/// A statement that passed validation.
///
/// Holds the original text (what gets executed - the AST rendering is only
/// used for screening) and the tables it references, for logging.
#[derive(Debug, Clone)]
pub struct ReadStatement {
    sql: String,
    tables: Vec<String>,
}

impl ReadStatement {
    pub fn as_str(&self) -> &str {
        &self.sql
    }

    /// Tables referenced in FROM/JOIN position, for tracing.
    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

/// Validates that a submission is a single read-only statement.
pub struct StatementGuard {
    dialect: PostgreSqlDialect,
}

impl Clone for StatementGuard {
    fn clone(&self) -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }
}

impl Default for StatementGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatementGuard {
    pub fn new() -> Self {
        Self {
            dialect: PostgreSqlDialect {},
        }
    }

    /// Classify a submission as read-only-safe or rejected.
    pub fn validate(&self, sql: &str) -> Result<ReadStatement, GuardError> {
        if sql.trim().is_empty() {
            return Err(GuardError::EmptyStatement);
        }

        let statements = Parser::parse_sql(&self.dialect, sql)
            .map_err(|e| GuardError::ParseError(e.to_string()))?;

        if statements.is_empty() {
            return Err(GuardError::EmptyStatement);
        }

        // Name the mutating verb first when a chain smuggles one in; the
        // chaining itself is rejected either way.
        if statements.len() > 1 {
            for stmt in &statements {
                if !matches!(stmt, Statement::Query(_)) {
                    return Err(GuardError::StatementNotAllowed {
                        verb: statement_verb(stmt),
                    });
                }
            }
            return Err(GuardError::MultipleStatements {
                count: statements.len(),
            });
        }

        let stmt = &statements[0];
        let query = match stmt {
            Statement::Query(query) => query,
            other => {
                let verb = statement_verb(other);
                tracing::warn!(verb = %verb, "rejected non-read statement");
                return Err(GuardError::StatementNotAllowed { verb });
            }
        };

        self.check_query(query)?;
        self.screen_functions(stmt)?;

        Ok(ReadStatement {
            sql: sql.to_string(),
            tables: self.extract_tables(query),
        })
    }

    /// Recursively inspect a query: locking clauses, SELECT INTO, and any
    /// write-shaped body smuggled into a CTE, derived table or set operation.
    fn check_query(&self, query: &Query) -> Result<(), GuardError> {
        if !query.locks.is_empty() {
            return Err(GuardError::LockingClause);
        }

        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.check_query(&cte.query)?;
            }
        }

        self.check_set_expr(&query.body)
    }

    fn check_set_expr(&self, body: &SetExpr) -> Result<(), GuardError> {
        match body {
            SetExpr::Select(select) => {
                if select.into.is_some() {
                    return Err(GuardError::SelectInto);
                }
                for table_with_joins in &select.from {
                    self.check_table_with_joins(table_with_joins)?;
                }
                Ok(())
            }
            SetExpr::Query(inner) => self.check_query(inner),
            SetExpr::SetOperation { left, right, .. } => {
                self.check_set_expr(left)?;
                self.check_set_expr(right)
            }
            SetExpr::Values(_) => Ok(()),
            other => Err(GuardError::StatementNotAllowed {
                verb: first_word(&other.to_string()),
            }),
        }
    }

    fn check_table_with_joins(&self, table_with_joins: &TableWithJoins) -> Result<(), GuardError> {
        self.check_table_factor(&table_with_joins.relation)?;
        for join in &table_with_joins.joins {
            self.check_table_factor(&join.relation)?;
        }
        Ok(())
    }

    fn check_table_factor(&self, table_factor: &TableFactor) -> Result<(), GuardError> {
        match table_factor {
            TableFactor::Derived { subquery, .. } => self.check_query(subquery),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.check_table_with_joins(table_with_joins),
            // Plain tables and table functions; function names are covered
            // by the identifier screen.
            _ => Ok(()),
        }
    }

    /// Screen every identifier in the canonical rendering against the
    /// function denylist. Identifiers inside string literals are screened
    /// too: a match there is ambiguous intent, and ambiguity rejects.
    fn screen_functions(&self, stmt: &Statement) -> Result<(), GuardError> {
        let canonical = stmt.to_string().to_lowercase();
        for word in canonical.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_')) {
            if word.is_empty() {
                continue;
            }
            if DENIED_FUNCTIONS.contains(&word)
                || DENIED_PREFIXES.iter().any(|p| word.starts_with(p))
            {
                return Err(GuardError::FunctionDenied {
                    name: word.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Extract table names from FROM/JOIN position, for tracing.
    fn extract_tables(&self, query: &Query) -> Vec<String> {
        let mut tables = Vec::new();
        self.collect_query_tables(query, &mut tables);
        tables
    }

    fn collect_query_tables(&self, query: &Query, tables: &mut Vec<String>) {
        if let Some(with) = &query.with {
            for cte in &with.cte_tables {
                self.collect_query_tables(&cte.query, tables);
            }
        }
        self.collect_set_expr_tables(&query.body, tables);
    }

    fn collect_set_expr_tables(&self, body: &SetExpr, tables: &mut Vec<String>) {
        match body {
            SetExpr::Select(select) => {
                for table_with_joins in &select.from {
                    self.collect_join_tables(table_with_joins, tables);
                }
            }
            SetExpr::Query(inner) => self.collect_query_tables(inner, tables),
            SetExpr::SetOperation { left, right, .. } => {
                self.collect_set_expr_tables(left, tables);
                self.collect_set_expr_tables(right, tables);
            }
            _ => {}
        }
    }

    fn collect_join_tables(&self, table_with_joins: &TableWithJoins, tables: &mut Vec<String>) {
        self.collect_factor_tables(&table_with_joins.relation, tables);
        for join in &table_with_joins.joins {
            self.collect_factor_tables(&join.relation, tables);
        }
    }

    fn collect_factor_tables(&self, table_factor: &TableFactor, tables: &mut Vec<String>) {
        match table_factor {
            TableFactor::Table { name, .. } => tables.push(name.to_string()),
            TableFactor::Derived { subquery, .. } => self.collect_query_tables(subquery, tables),
            TableFactor::NestedJoin {
                table_with_joins, ..
            } => self.collect_join_tables(table_with_joins, tables),
            _ => {}
        }
    }
}

/// Leading verb of a statement's canonical rendering, e.g. "DROP".
fn statement_verb(stmt: &Statement) -> String {
    first_word(&stmt.to_string())
}

fn first_word(s: &str) -> String {
    s.split_whitespace()
        .next()
        .unwrap_or("UNKNOWN")
        .to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn guard() -> StatementGuard {
        StatementGuard::new()
    }

    #[test]
    fn test_accepts_simple_select() {
        let stmt = guard().validate("SELECT id, name FROM projects").unwrap();
        assert_eq!(stmt.as_str(), "SELECT id, name FROM projects");
        assert_eq!(stmt.tables(), &["projects".to_string()]);
    }

    #[test]
    fn test_accepts_cte_and_joins() {
        let sql = "WITH recent AS (SELECT * FROM tasks WHERE created_at > now() - interval '7 days') \
                   SELECT p.name, count(*) FROM recent r JOIN projects p ON p.id = r.project_id GROUP BY p.name";
        let stmt = guard().validate(sql).unwrap();
        assert!(stmt.tables().contains(&"tasks".to_string()));
        assert!(stmt.tables().contains(&"projects".to_string()));
    }

    #[test]
    fn test_accepts_union_and_subquery() {
        assert!(guard()
            .validate("SELECT id FROM a UNION ALL SELECT id FROM b")
            .is_ok());
        assert!(guard()
            .validate("SELECT * FROM (SELECT id FROM items LIMIT 5) sub WHERE id > 1")
            .is_ok());
    }

    #[test]
    fn test_rejects_mutating_statements() {
        for sql in [
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET a = 1",
            "DELETE FROM t",
            "DROP TABLE t",
            "CREATE TABLE t (id INT)",
            "ALTER TABLE t ADD COLUMN b INT",
            "TRUNCATE TABLE t",
            "GRANT SELECT ON t TO reporting",
        ] {
            let err = guard().validate(sql).unwrap_err();
            assert!(
                matches!(err, GuardError::StatementNotAllowed { .. }),
                "expected rejection for {sql:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_rejection_names_the_verb() {
        let err = guard().validate("DROP TABLE projects").unwrap_err();
        assert_eq!(
            err.to_string(),
            "DROP statements are not allowed on a read-only connection"
        );
    }

    #[test]
    fn test_rejects_chained_statement_after_read() {
        // The mutating verb is named even though the chain alone is fatal.
        let err = guard().validate("DROP TABLE projects; SELECT 1").unwrap_err();
        assert!(matches!(
            err,
            GuardError::StatementNotAllowed { ref verb } if verb == "DROP"
        ));

        let err = guard().validate("SELECT 1; DELETE FROM t").unwrap_err();
        assert!(matches!(
            err,
            GuardError::StatementNotAllowed { ref verb } if verb == "DELETE"
        ));
    }

    #[test]
    fn test_rejects_pure_read_chain() {
        let err = guard().validate("SELECT 1; SELECT 2").unwrap_err();
        assert!(matches!(err, GuardError::MultipleStatements { count: 2 }));
    }

    #[test]
    fn test_rejects_select_into() {
        let err = guard()
            .validate("SELECT * INTO copied FROM projects")
            .unwrap_err();
        assert!(matches!(err, GuardError::SelectInto));
    }

    #[test]
    fn test_rejects_locking_reads() {
        let err = guard()
            .validate("SELECT * FROM tasks WHERE id = 1 FOR UPDATE")
            .unwrap_err();
        assert!(matches!(err, GuardError::LockingClause));
    }

    #[test]
    fn test_rejects_denied_functions() {
        for sql in [
            "SELECT pg_sleep(30)",
            "SELECT pg_read_file('/etc/passwd')",
            "SELECT * FROM pg_ls_dir('.')",
            "SELECT lo_import('/tmp/x')",
            "SELECT dblink_connect('host=evil')",
            "SELECT set_config('x', 'y', false)",
        ] {
            let err = guard().validate(sql).unwrap_err();
            assert!(
                matches!(err, GuardError::FunctionDenied { .. }),
                "expected function denial for {sql:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_comment_evasion_does_not_hide_verbs() {
        // Comments are not tokens; the DELETE is still seen.
        assert!(guard()
            .validate("/* harmless */ DELETE /* ha */ FROM t")
            .is_err());
        assert!(guard().validate("-- note\nDROP TABLE t").is_err());
    }

    #[test]
    fn test_unparseable_input_is_rejected() {
        let err = guard().validate("SELECT 'unterminated").unwrap_err();
        assert!(matches!(err, GuardError::ParseError(_)));
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(
            guard().validate("   "),
            Err(GuardError::EmptyStatement)
        ));
    }

    #[test]
    fn test_mutating_verb_in_string_literal_of_read() {
        // Structurally a pure read; the literal is data, not syntax.
        assert!(guard()
            .validate("SELECT 'DROP TABLE projects' AS phrase")
            .is_ok());
    }
}
