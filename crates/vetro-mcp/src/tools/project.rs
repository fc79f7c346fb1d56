//! Project summary and dashboard tools.

use serde::Deserialize;
use serde_json::{json, Value};

use vetro_core::{CellValue, QueryResult};

use crate::state::ServerState;
use crate::tools::{parse_args, run_compacted, sql_quote, ToolError};

#[derive(Debug, Deserialize)]
struct ProjectArgs {
    #[serde(default)]
    project_id: Option<i64>,
    #[serde(default)]
    project_name: Option<String>,
}

impl ProjectArgs {
    /// SQL condition selecting the requested project(s).
    fn condition(&self) -> Result<String, ToolError> {
        match (self.project_id, &self.project_name) {
            (Some(id), _) => Ok(format!("p.id = {id}")),
            (None, Some(name)) => Ok(format!("p.name ILIKE '%{}%'", sql_quote(name))),
            (None, None) => Err(ToolError::InvalidArguments(
                "provide either project_id or project_name".to_string(),
            )),
        }
    }
}

/// Project info with task counts by status, overdue count and last activity.
pub async fn project_summary(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: ProjectArgs = parse_args(arguments)?;
    let condition = args.condition()?;
    tracing::info!(
        project_id = args.project_id,
        project_name = args.project_name.as_deref(),
        "project_summary"
    );

    let sql = format!(
        "SELECT p.id, p.name, p.description, p.status, p.start_date, p.end_date, p.created_at, \
         COUNT(t.id) AS total_tasks, \
         COUNT(CASE WHEN t.status = 'completed' THEN 1 END) AS completed, \
         COUNT(CASE WHEN t.status = 'new' THEN 1 END) AS new_tasks, \
         COUNT(CASE WHEN t.status NOT IN ('completed', 'new') THEN 1 END) AS in_progress, \
         COUNT(CASE WHEN t.due_date < NOW() AND t.status != 'completed' THEN 1 END) AS overdue, \
         MAX(t.updated_at) AS last_activity \
         FROM teamwork.projects p \
         LEFT JOIN teamwork.tasks t ON p.id = t.project_id \
         WHERE {condition} \
         GROUP BY p.id ORDER BY p.name LIMIT 10"
    );

    run_compacted(state, &sql).await
}

/// Project dashboard: task stats plus recent activity across all sources.
pub async fn project_dashboard(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: ProjectArgs = parse_args(arguments)?;
    let condition = args.condition()?;
    tracing::info!(
        project_id = args.project_id,
        project_name = args.project_name.as_deref(),
        "project_dashboard"
    );

    // Resolve the project first; everything after keys off its id.
    let lookup = fetch(
        state,
        &format!("SELECT p.id, p.name FROM teamwork.projects p WHERE {condition} LIMIT 1"),
    )
    .await?;
    let Some((project_id, project_name)) = first_id_and_name(&lookup) else {
        return Err(ToolError::InvalidArguments(format!(
            "project not found: {}",
            args.project_name
                .as_deref()
                .map(String::from)
                .unwrap_or_else(|| args.project_id.unwrap_or_default().to_string())
        )));
    };

    let stats = fetch(
        state,
        &format!(
            "SELECT COUNT(*) AS total, \
             COUNT(CASE WHEN status = 'completed' THEN 1 END) AS completed, \
             COUNT(CASE WHEN status = 'new' THEN 1 END) AS new, \
             COUNT(CASE WHEN status NOT IN ('completed','new') THEN 1 END) AS in_progress, \
             COUNT(CASE WHEN due_date < NOW() AND status != 'completed' THEN 1 END) AS overdue \
             FROM teamwork.tasks WHERE project_id = {project_id}"
        ),
    )
    .await?;
    let task_stats = stats.rows_as_json().into_iter().next().unwrap_or(json!({}));

    let recent_tasks = run_compacted(
        state,
        &format!(
            "SELECT id, name, status, priority, due_date, updated_at \
             FROM teamwork.tasks \
             WHERE project_id = {project_id} AND status != 'completed' \
             ORDER BY updated_at DESC LIMIT 5"
        ),
    )
    .await?;

    let recent_messages = run_compacted(
        state,
        &format!(
            "SELECT m.id, m.subject, m.preview, m.delivered_at, c.name AS from_name \
             FROM missive.messages m \
             JOIN public.project_conversations pc ON m.conversation_id = pc.m_conversation_id \
             LEFT JOIN missive.contacts c ON m.from_contact_id = c.id \
             WHERE pc.tw_project_id = {project_id} \
             ORDER BY m.delivered_at DESC LIMIT 5"
        ),
    )
    .await?;

    let recent_files = run_compacted(
        state,
        &format!(
            "SELECT f.id, f.full_path, fc.storage_path, f.db_created_at \
             FROM public.files f \
             JOIN public.file_contents fc ON f.content_hash = fc.content_hash \
             WHERE f.project_id = {project_id} AND f.deleted_at IS NULL \
             ORDER BY f.db_created_at DESC LIMIT 5"
        ),
    )
    .await?;

    let key_contacts = run_compacted(
        state,
        &format!(
            "SELECT c.name, c.email, COUNT(*) AS msg_count \
             FROM missive.messages m \
             JOIN public.project_conversations pc ON m.conversation_id = pc.m_conversation_id \
             JOIN missive.contacts c ON m.from_contact_id = c.id \
             WHERE pc.tw_project_id = {project_id} \
             GROUP BY c.name, c.email \
             ORDER BY msg_count DESC LIMIT 5"
        ),
    )
    .await?;

    let recent_activity = run_compacted(
        state,
        &format!(
            "WITH combined AS ( \
             SELECT 'task' AS type, name AS title, updated_at AS ts \
             FROM teamwork.tasks WHERE project_id = {project_id} \
             UNION ALL \
             SELECT 'email', m.subject, m.delivered_at \
             FROM missive.messages m \
             JOIN public.project_conversations pc ON m.conversation_id = pc.m_conversation_id \
             WHERE pc.tw_project_id = {project_id} \
             UNION ALL \
             SELECT 'file', f.full_path, f.db_created_at \
             FROM public.files f \
             WHERE f.project_id = {project_id} AND f.deleted_at IS NULL \
             ) \
             SELECT DISTINCT ON (DATE_TRUNC('hour', ts), type, LEFT(title, 50)) \
             type, title, ts \
             FROM combined WHERE ts IS NOT NULL \
             ORDER BY DATE_TRUNC('hour', ts) DESC, type, LEFT(title, 50), ts DESC \
             LIMIT 10"
        ),
    )
    .await?;

    Ok(json!({
        "project": {
            "id": project_id,
            "name": project_name,
            "tasks": task_stats,
        },
        "recent_activity": recent_activity["data"],
        "recent_tasks": recent_tasks["data"],
        "recent_messages": recent_messages["data"],
        "recent_files": recent_files["data"],
        "key_contacts": key_contacts["data"],
    }))
}

async fn fetch(state: &ServerState, sql: &str) -> Result<QueryResult, ToolError> {
    let statement = state.guard.validate(sql)?;
    let database = state.database()?;
    Ok(database.execute(&statement, &state.config.limits).await?)
}

fn first_id_and_name(result: &QueryResult) -> Option<(i64, String)> {
    let row = result.rows.first()?;
    let id = match row.first()? {
        CellValue::Int(v) => *v,
        _ => return None,
    };
    let name = match row.get(1)? {
        CellValue::Text(s) => s.clone(),
        _ => return None,
    };
    Some((id, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_condition_requires_a_selector() {
        let args = ProjectArgs {
            project_id: None,
            project_name: None,
        };
        assert!(args.condition().is_err());

        let args = ProjectArgs {
            project_id: Some(7),
            project_name: None,
        };
        assert_eq!(args.condition().unwrap(), "p.id = 7");

        let args = ProjectArgs {
            project_id: None,
            project_name: Some("Harbor '22".to_string()),
        };
        assert_eq!(
            args.condition().unwrap(),
            "p.name ILIKE '%Harbor ''22%'"
        );
    }

    #[test]
    fn test_first_id_and_name() {
        let result = QueryResult {
            columns: vec![
                vetro_core::Column::new("id", "INT8"),
                vetro_core::Column::new("name", "TEXT"),
            ],
            rows: vec![vec![CellValue::Int(3), CellValue::Text("Harbor".into())]],
            more_rows: false,
            elapsed_ms: 0,
        };
        assert_eq!(first_id_and_name(&result), Some((3, "Harbor".to_string())));
        assert_eq!(first_id_and_name(&QueryResult::empty()), None);
    }
}
