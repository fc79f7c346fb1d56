//! TOON encoding with size-aware truncation.

use vetro_core::{CellValue, QueryResult};

use crate::error::ToonError;
use crate::{MARKER_PREFIX, NULL_MARK};

/// The encoded form of a query result.
#[derive(Debug, Clone)]
pub struct CompactEncoding {
    pub text: String,
    pub rows_emitted: usize,
    pub rows_total: usize,
    /// Content was dropped: either the encoder cut trailing rows to fit the
    /// byte cap, or the executor already reported more rows upstream.
    pub truncated: bool,
}

/// Encode a result, dropping trailing rows until the text fits `byte_cap`.
///
/// Rows are never split. If the header plus the first row alone exceed the
/// cap, the row is unencodable and [`ToonError::RowTooLarge`] is returned.
pub fn encode(result: &QueryResult, byte_cap: usize) -> Result<CompactEncoding, ToonError> {
    let total = result.rows.len();
    let lines: Vec<String> = result.rows.iter().map(|row| encode_row(row)).collect();

    let mut emitted = total;
    loop {
        let text = assemble(result, &lines, emitted, total);
        if text.len() <= byte_cap {
            if emitted == 0 && total > 0 {
                // Not even one row fits next to the header: the row is
                // unencodable, never silently elided.
                let row_bytes = assemble(result, &lines, 1, total).len();
                return Err(ToonError::RowTooLarge { row_bytes, byte_cap });
            }
            return Ok(CompactEncoding {
                text,
                rows_emitted: emitted,
                rows_total: total,
                truncated: emitted < total || result.more_rows,
            });
        }
        if emitted == 0 {
            let row_bytes = if total > 0 {
                assemble(result, &lines, 1, total).len()
            } else {
                text.len()
            };
            return Err(ToonError::RowTooLarge { row_bytes, byte_cap });
        }
        emitted -= 1;
    }
}

fn assemble(result: &QueryResult, lines: &[String], emitted: usize, total: usize) -> String {
    let header_cols = result
        .columns
        .iter()
        .map(|c| encode_text(&c.name))
        .collect::<Vec<_>>()
        .join(",");
    let more = if result.more_rows { "+" } else { "" };

    let mut out = format!("rows[{emitted}/{total}{more}]{{{header_cols}}}:");
    for line in &lines[..emitted] {
        out.push_str("\n  ");
        out.push_str(line);
    }

    let omitted = total - emitted;
    if omitted > 0 {
        out.push('\n');
        out.push_str(MARKER_PREFIX);
        out.push_str(&format!("{omitted} rows omitted"));
    } else if result.more_rows {
        out.push('\n');
        out.push_str(MARKER_PREFIX);
        out.push_str("row cap reached, more rows exist");
    }
    out
}

fn encode_row(row: &[CellValue]) -> String {
    row.iter()
        .map(encode_cell)
        .collect::<Vec<_>>()
        .join(",")
}

/// Encode one cell. NULL, booleans and numbers are bare; timestamps render
/// as RFC 3339 (comma-free, so also bare); text goes through the quoting
/// rules.
pub(crate) fn encode_cell(cell: &CellValue) -> String {
    match cell {
        CellValue::Null => NULL_MARK.to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Int(v) => v.to_string(),
        CellValue::Float(v) => v.to_string(),
        CellValue::Text(s) => encode_text(s),
        CellValue::Timestamp(ts) => ts.to_rfc3339(),
        CellValue::Json(v) => encode_text(&v.to_string()),
        CellValue::Bytes(len) => format!("<{len} bytes>"),
    }
}

/// Quote and escape a text cell when it could be mistaken for structure:
/// delimiters, escapes, line breaks, braces, the NULL mark, boolean or
/// numeric look-alikes, a leading `#`, surrounding whitespace, or emptiness.
pub(crate) fn encode_text(s: &str) -> String {
    if !needs_quoting(s) {
        return s.to_string();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\"\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

fn needs_quoting(s: &str) -> bool {
    if s.is_empty()
        || s == NULL_MARK
        || s == "true"
        || s == "false"
        || s.starts_with('#')
        || s.trim() != s
    {
        return true;
    }
    if s.parse::<i64>().is_ok() || s.parse::<f64>().is_ok() {
        return true;
    }
    s.chars()
        .any(|c| matches!(c, ',' | '"' | '\\' | '\n' | '\r' | '\t' | '{' | '}'))
}
