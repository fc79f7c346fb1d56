//! Data-context scanning.
//!
//! Scripts reach the database only through `db_query("...")` with a string
//! literal: the dispatcher scans the code for those literals up front,
//! validates and executes each one, and ships the results into the sandbox
//! as the bound context. Anything else raises inside the sandbox.

use regex::Regex;
use std::sync::OnceLock;

fn patterns() -> &'static [Regex; 4] {
    static PATTERNS: OnceLock<[Regex; 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Triple-quoted literals first; the single-quoted patterns also
            // match their inner text, which normalizes to the same key.
            Regex::new(r#"db_query\s*\(\s*"""([\s\S]+?)"""\s*\)"#).unwrap(),
            Regex::new(r"db_query\s*\(\s*'''([\s\S]+?)'''\s*\)").unwrap(),
            Regex::new(r#"db_query\s*\(\s*"([^"]+)"\s*\)"#).unwrap(),
            Regex::new(r"db_query\s*\(\s*'([^']+)'\s*\)").unwrap(),
        ]
    })
}

/// Whitespace-normalize SQL so the scan key matches the driver's lookup key.
pub fn normalize_query(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the normalized, deduplicated `db_query` string literals from a
/// script, in order of first appearance.
pub fn scan_query_literals(code: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for pattern in patterns() {
        for captures in pattern.captures_iter(code) {
            if let Some(m) = captures.get(1) {
                let normalized = normalize_query(m.as_str());
                if !normalized.is_empty() && !seen.contains(&normalized) {
                    seen.push(normalized);
                }
            }
        }
    }
    seen
}
