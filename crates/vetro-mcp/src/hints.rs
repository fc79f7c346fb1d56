//! Helpful hints for common database errors.
//!
//! Error messages the driver surfaces are kept verbatim; when one matches a
//! known stumbling block, a hint for the agent is appended.

const HINTS: &[(&str, &str)] = &[
    (
        "relation",
        "Table not found. Use get_schema() to see available tables.",
    ),
    (
        "column",
        "Column not found. Use get_schema(schema, table) to see columns.",
    ),
    (
        "permission denied",
        "Permission denied. This is a read-only connection.",
    ),
    ("syntax error", "SQL syntax error. Check your query syntax."),
    (
        "statement timeout",
        "Query timeout. Add more specific WHERE conditions or LIMIT.",
    ),
];

/// Append a hint to a database error message when one applies.
pub fn enhance_error(message: &str) -> String {
    let lower = message.to_lowercase();
    for (needle, hint) in HINTS {
        if lower.contains(needle) {
            return format!("{message}\n\nHint: {hint}");
        }
    }
    message.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_errors_get_hints() {
        let msg = enhance_error("relation \"missing\" does not exist");
        assert!(msg.contains("get_schema()"));

        let msg = enhance_error("canceling statement due to statement timeout");
        assert!(msg.contains("WHERE conditions"));
    }

    #[test]
    fn test_unknown_errors_pass_through() {
        assert_eq!(enhance_error("weird failure"), "weird failure");
    }
}
