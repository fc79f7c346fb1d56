//! Search convenience tools over the message and task stores.
//!
//! These are parameterized SQL composition only: filters become quoted
//! literals, the composed text still passes the guard, and results exit
//! through the shared compaction path.

use serde::Deserialize;
use serde_json::Value;

use crate::state::ServerState;
use crate::tools::{parse_args, run_compacted, sql_quote, ToolError};

const MAX_SEARCH_LIMIT: u64 = 200;

#[derive(Debug, Deserialize)]
struct SearchMessagesArgs {
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    from_email: Option<String>,
    #[serde(default)]
    has_attachment: Option<bool>,
    #[serde(default)]
    min_attachment_size: Option<u64>,
    #[serde(default)]
    min_attachments: Option<u64>,
    #[serde(default)]
    attachment_type: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    search_text: Option<String>,
    #[serde(default = "default_limit")]
    limit: u64,
}

#[derive(Debug, Deserialize)]
struct SearchTasksArgs {
    #[serde(default)]
    project_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    assignee_email: Option<String>,
    #[serde(default)]
    search_text: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    overdue_only: bool,
    #[serde(default = "default_limit")]
    limit: u64,
}

fn default_limit() -> u64 {
    50
}

/// Search email messages, optionally filtered by attachment shape.
pub async fn search_messages(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: SearchMessagesArgs = parse_args(arguments)?;
    let limit = args.limit.clamp(1, MAX_SEARCH_LIMIT);
    tracing::info!(
        subject = args.subject.as_deref(),
        from = args.from_email.as_deref(),
        text = args.search_text.as_deref(),
        limit,
        "search_messages"
    );

    let mut select_cols = vec![
        "m.id",
        "m.subject",
        "m.preview",
        "m.delivered_at",
        "c.name AS from_name",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();
    let mut joins = vec![
        "FROM missive.messages m".to_string(),
        "LEFT JOIN missive.contacts c ON m.from_contact_id = c.id".to_string(),
    ];
    let mut conditions: Vec<String> = Vec::new();
    let mut having: Vec<String> = Vec::new();

    let wants_attachments = args.has_attachment.is_some()
        || args.min_attachment_size.is_some()
        || args.min_attachments.is_some()
        || args.attachment_type.is_some();
    if wants_attachments {
        joins.push("LEFT JOIN missive.attachments a ON m.id = a.message_id".to_string());
        select_cols.push("COUNT(a.id) AS attachment_count".to_string());
        select_cols.push("SUM(a.size) AS total_size".to_string());
        match args.has_attachment {
            Some(true) => conditions.push("a.id IS NOT NULL".to_string()),
            Some(false) => conditions.push("a.id IS NULL".to_string()),
            None => {}
        }
        if let Some(kind) = &args.attachment_type {
            let safe = sql_quote(&kind.to_lowercase());
            conditions.push(format!(
                "(a.extension ILIKE '{safe}' OR a.media_type ILIKE '%{safe}%')"
            ));
        }
        if let Some(size) = args.min_attachment_size {
            having.push(format!("SUM(a.size) >= {size}"));
        }
        if let Some(count) = args.min_attachments {
            having.push(format!("COUNT(a.id) >= {count}"));
        }
    }

    if let Some(label) = &args.label {
        joins.push(
            "JOIN missive.conversation_labels cl ON m.conversation_id = cl.conversation_id"
                .to_string(),
        );
        joins.push("JOIN missive.shared_labels sl ON cl.label_id = sl.id".to_string());
        conditions.push(format!("sl.name ILIKE '%{}%'", sql_quote(label)));
    }
    if let Some(subject) = &args.subject {
        conditions.push(format!("m.subject ILIKE '%{}%'", sql_quote(subject)));
    }
    if let Some(from_email) = &args.from_email {
        conditions.push(format!("c.email = '{}'", sql_quote(from_email)));
    }
    if let Some(text) = &args.search_text {
        let safe = sql_quote(text);
        conditions.push(format!(
            "(m.subject ILIKE '%{safe}%' OR m.body_plain_text ILIKE '%{safe}%')"
        ));
    }

    let where_clause = if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    };
    let having_clause = if having.is_empty() {
        String::new()
    } else {
        format!("HAVING {} ", having.join(" AND "))
    };
    let group_by = if wants_attachments || args.label.is_some() {
        "GROUP BY m.id, m.subject, m.preview, m.delivered_at, c.name "
    } else {
        ""
    };

    let sql = format!(
        "SELECT {} {} WHERE {} {}{}ORDER BY m.delivered_at DESC LIMIT {limit}",
        select_cols.join(", "),
        joins.join(" "),
        where_clause,
        group_by,
        having_clause,
    );

    run_compacted(state, &sql).await
}

/// Search tasks with filters.
pub async fn search_tasks(state: &ServerState, arguments: Value) -> Result<Value, ToolError> {
    let args: SearchTasksArgs = parse_args(arguments)?;
    let limit = args.limit.clamp(1, MAX_SEARCH_LIMIT);
    tracing::info!(
        project = args.project_name.as_deref(),
        status = args.status.as_deref(),
        text = args.search_text.as_deref(),
        limit,
        "search_tasks"
    );

    let mut joins = vec![
        "FROM teamwork.tasks t".to_string(),
        "LEFT JOIN teamwork.projects p ON t.project_id = p.id".to_string(),
        "LEFT JOIN teamwork.task_assignees ta ON t.id = ta.task_id".to_string(),
        "LEFT JOIN teamwork.users u ON ta.user_id = u.id".to_string(),
    ];
    let mut conditions: Vec<String> = Vec::new();

    if let Some(project) = &args.project_name {
        conditions.push(format!("p.name ILIKE '%{}%'", sql_quote(project)));
    }
    if let Some(status) = &args.status {
        conditions.push(format!("t.status = '{}'", sql_quote(status)));
    }
    if let Some(assignee) = &args.assignee_email {
        conditions.push(format!("u.email = '{}'", sql_quote(assignee)));
    }
    if let Some(text) = &args.search_text {
        let safe = sql_quote(text);
        conditions.push(format!(
            "(t.name ILIKE '%{safe}%' OR t.description ILIKE '%{safe}%')"
        ));
    }
    if let Some(tag) = &args.tag {
        joins.push("JOIN teamwork.task_tags tt ON t.id = tt.task_id".to_string());
        joins.push("JOIN teamwork.tags tg ON tt.tag_id = tg.id".to_string());
        conditions.push(format!("tg.name ILIKE '%{}%'", sql_quote(tag)));
    }
    if args.overdue_only {
        conditions.push("t.due_date < NOW()".to_string());
        conditions.push("t.status != 'completed'".to_string());
    }

    let where_clause = if conditions.is_empty() {
        "TRUE".to_string()
    } else {
        conditions.join(" AND ")
    };

    let sql = format!(
        "SELECT DISTINCT t.id, t.name AS task_name, t.description, t.status, t.priority, \
         t.due_date, t.created_at, p.name AS project_name, u.email AS assignee_email \
         {} WHERE {} ORDER BY t.created_at DESC LIMIT {limit}",
        joins.join(" "),
        where_clause,
    );

    run_compacted(state, &sql).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_quote_through_composition() {
        // The composed filters survive the guard even with hostile input:
        // quotes are doubled so the literal stays a literal.
        let guard = vetro_guard::StatementGuard::new();
        let hostile = sql_quote("x'; DROP TABLE tasks; --");
        let sql = format!(
            "SELECT id FROM teamwork.tasks t WHERE t.name ILIKE '%{hostile}%' LIMIT 10"
        );
        assert!(guard.validate(&sql).is_ok());
    }

    #[test]
    fn test_limit_defaults() {
        let args: SearchTasksArgs = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(args.limit, 50);
        assert!(!args.overdue_only);
    }
}
