//! TOON decoding.
//!
//! The decoder exists to make the encoding's round-trip guarantee testable
//! and to give downstream consumers a reference parser. Cell types are
//! recovered from syntax: bare tokens decode to NULL/bool/number, quoted
//! tokens always decode to text (the encoder quotes any text that could be
//! mistaken for something else).

use vetro_core::CellValue;

use crate::error::ToonError;
use crate::NULL_MARK;

/// A decoded TOON document.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
    pub rows_total: usize,
    /// The executor reported more rows upstream (`total+` in the header).
    pub more_rows: bool,
    /// A truncation marker line was present.
    pub truncated: bool,
}

/// Parse a TOON document produced by [`crate::encode`].
pub fn decode(text: &str) -> Result<Decoded, ToonError> {
    let mut lines = text.lines().enumerate();

    let (_, header) = lines
        .next()
        .ok_or_else(|| decode_err(1, "empty document"))?;
    let (emitted, rows_total, more_rows, columns) = parse_header(header)?;

    let mut rows = Vec::with_capacity(emitted);
    let mut truncated = false;

    for (idx, line) in lines {
        let line_no = idx + 1;
        if truncated {
            return Err(decode_err(line_no, "content after truncation marker"));
        }
        if let Some(marker) = line.strip_prefix("  # ") {
            if !marker.starts_with("truncated:") {
                return Err(decode_err(line_no, "unknown marker line"));
            }
            truncated = true;
            continue;
        }
        let Some(content) = line.strip_prefix("  ") else {
            return Err(decode_err(line_no, "row line must be indented two spaces"));
        };
        let cells = parse_cells(content, line_no)?;
        if cells.len() != columns.len() {
            return Err(decode_err(
                line_no,
                format!(
                    "expected {} cells, found {}",
                    columns.len(),
                    cells.len()
                ),
            ));
        }
        rows.push(cells);
    }

    if rows.len() != emitted {
        return Err(decode_err(
            1,
            format!("header claims {} rows, found {}", emitted, rows.len()),
        ));
    }

    Ok(Decoded {
        columns,
        rows,
        rows_total,
        more_rows,
        truncated: truncated || more_rows,
    })
}

fn parse_header(line: &str) -> Result<(usize, usize, bool, Vec<String>), ToonError> {
    let rest = line
        .strip_prefix("rows[")
        .ok_or_else(|| decode_err(1, "header must start with rows["))?;

    let (counts, rest) = rest
        .split_once(']')
        .ok_or_else(|| decode_err(1, "unterminated row counts"))?;
    let (emitted, total_part) = counts
        .split_once('/')
        .ok_or_else(|| decode_err(1, "row counts must be emitted/total"))?;
    let emitted: usize = emitted
        .parse()
        .map_err(|_| decode_err(1, "bad emitted count"))?;
    let more_rows = total_part.ends_with('+');
    let total: usize = total_part
        .trim_end_matches('+')
        .parse()
        .map_err(|_| decode_err(1, "bad total count"))?;

    let rest = rest
        .strip_prefix('{')
        .ok_or_else(|| decode_err(1, "missing column block"))?;
    let (cols_part, tail) = split_at_closing_brace(rest)
        .ok_or_else(|| decode_err(1, "unterminated column block"))?;
    if tail != ":" {
        return Err(decode_err(1, "header must end with }:"));
    }

    let columns = if cols_part.is_empty() {
        Vec::new()
    } else {
        parse_cells(cols_part, 1)?
            .into_iter()
            .map(|cell| match cell {
                CellValue::Text(s) => s,
                other => cell_to_name(other),
            })
            .collect()
    };

    Ok((emitted, total, more_rows, columns))
}

/// Find the `}` that closes the column block, honoring quoted cells.
fn split_at_closing_brace(s: &str) -> Option<(&str, &str)> {
    let mut in_quotes = false;
    let mut chars = s.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if in_quotes {
            match c {
                '\\' => {
                    chars.next();
                }
                '"' => {
                    // Doubled quote is an escaped quote, still inside.
                    if chars.peek().is_some_and(|&(_, next)| next == '"') {
                        chars.next();
                    } else {
                        in_quotes = false;
                    }
                }
                _ => {}
            }
        } else {
            match c {
                '"' => in_quotes = true,
                '}' => return Some((&s[..i], &s[i + 1..])),
                _ => {}
            }
        }
    }
    None
}

/// Column names are cells too; non-text bare tokens just keep their
/// rendering.
fn cell_to_name(cell: CellValue) -> String {
    match cell {
        CellValue::Text(s) => s,
        other => crate::encode::encode_cell(&other),
    }
}

/// Split a line into cells, honoring quotes and escapes.
fn parse_cells(content: &str, line_no: usize) -> Result<Vec<CellValue>, ToonError> {
    let mut cells = Vec::new();
    let mut chars = content.chars().peekable();

    loop {
        if chars.peek() == Some(&'"') {
            chars.next();
            let mut value = String::new();
            loop {
                let Some(c) = chars.next() else {
                    return Err(decode_err(line_no, "unterminated quoted cell"));
                };
                match c {
                    '\\' => match chars.next() {
                        Some('n') => value.push('\n'),
                        Some('r') => value.push('\r'),
                        Some('t') => value.push('\t'),
                        Some('\\') => value.push('\\'),
                        _ => return Err(decode_err(line_no, "bad escape in quoted cell")),
                    },
                    '"' => {
                        if chars.peek() == Some(&'"') {
                            chars.next();
                            value.push('"');
                        } else {
                            break;
                        }
                    }
                    _ => value.push(c),
                }
            }
            cells.push(CellValue::Text(value));
            match chars.next() {
                None => break,
                Some(',') => continue,
                Some(_) => {
                    return Err(decode_err(line_no, "expected comma after quoted cell"))
                }
            }
        } else {
            let mut token = String::new();
            let mut saw_comma = false;
            for c in chars.by_ref() {
                if c == ',' {
                    saw_comma = true;
                    break;
                }
                token.push(c);
            }
            cells.push(interpret_bare(&token));
            if !saw_comma {
                break;
            }
        }
    }

    Ok(cells)
}

fn interpret_bare(token: &str) -> CellValue {
    if token == NULL_MARK {
        return CellValue::Null;
    }
    match token {
        "true" => return CellValue::Bool(true),
        "false" => return CellValue::Bool(false),
        _ => {}
    }
    if let Ok(v) = token.parse::<i64>() {
        return CellValue::Int(v);
    }
    if let Ok(v) = token.parse::<f64>() {
        return CellValue::Float(v);
    }
    CellValue::Text(token.to_string())
}

fn decode_err(line: usize, message: impl Into<String>) -> ToonError {
    ToonError::Decode {
        line,
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::encode;
    use pretty_assertions::assert_eq;
    use vetro_core::{Column, QueryResult};

    fn roundtrip(rows: Vec<Vec<CellValue>>) {
        let result = QueryResult {
            columns: vec![Column::new("a", "TEXT"), Column::new("b", "TEXT")],
            rows: rows.clone(),
            more_rows: false,
            elapsed_ms: 0,
        };
        let enc = encode(&result, usize::MAX).unwrap();
        let dec = decode(&enc.text).unwrap();
        assert_eq!(dec.columns, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(dec.rows, rows);
        assert!(!dec.truncated);
    }

    #[test]
    fn test_roundtrip_plain() {
        roundtrip(vec![
            vec![CellValue::Int(1), CellValue::Text("alpha".into())],
            vec![CellValue::Null, CellValue::Bool(true)],
            vec![CellValue::Float(2.5), CellValue::Text("beta".into())],
        ]);
    }

    #[test]
    fn test_roundtrip_hostile_strings() {
        roundtrip(vec![
            vec![
                CellValue::Text("has,comma".into()),
                CellValue::Text("has\"quote".into()),
            ],
            vec![
                CellValue::Text("multi\nline\r\nand\ttab".into()),
                CellValue::Text("back\\slash\\".into()),
            ],
            vec![
                CellValue::Text(String::new()),
                CellValue::Text("∅".into()),
            ],
            vec![
                CellValue::Text("true".into()),
                CellValue::Text("42".into()),
            ],
            vec![
                CellValue::Text("  leading and trailing  ".into()),
                CellValue::Text("# looks like a marker".into()),
            ],
            vec![
                CellValue::Text("{braces}".into()),
                CellValue::Text("\"".into()),
            ],
        ]);
    }

    #[test]
    fn test_roundtrip_column_names_with_delimiters() {
        let result = QueryResult {
            columns: vec![
                Column::new("plain", "TEXT"),
                Column::new("with,comma", "TEXT"),
                Column::new("with}brace", "TEXT"),
            ],
            rows: vec![vec![
                CellValue::Int(1),
                CellValue::Int(2),
                CellValue::Int(3),
            ]],
            more_rows: false,
            elapsed_ms: 0,
        };
        let enc = encode(&result, usize::MAX).unwrap();
        let dec = decode(&enc.text).unwrap();
        assert_eq!(
            dec.columns,
            vec!["plain".to_string(), "with,comma".into(), "with}brace".into()]
        );
    }

    #[test]
    fn test_decode_truncated_document() {
        let result = QueryResult {
            columns: vec![Column::new("n", "INT8")],
            rows: (0..10).map(|i| vec![CellValue::Int(i)]).collect(),
            more_rows: false,
            elapsed_ms: 0,
        };
        // Small cap: some rows dropped, marker emitted.
        let enc = encode(&result, 64).unwrap();
        assert!(enc.truncated);
        let dec = decode(&enc.text).unwrap();
        assert!(dec.truncated);
        assert_eq!(dec.rows.len(), enc.rows_emitted);
        assert_eq!(dec.rows_total, 10);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(decode("").is_err());
        assert!(decode("not a header").is_err());
        assert!(decode("rows[1/1]{a}:\nno-indent").is_err());
        assert!(decode("rows[2/2]{a}:\n  1").is_err()); // header/row count mismatch
        assert!(decode("rows[1/1]{a}:\n  \"unterminated").is_err());
    }

    #[test]
    fn test_small_result_roundtrips_untruncated() {
        let result = QueryResult {
            columns: vec![Column::new("id", "INT8"), Column::new("name", "TEXT")],
            rows: vec![
                vec![CellValue::Int(1), CellValue::Text("Alpha".into())],
                vec![CellValue::Int(2), CellValue::Text("Beta".into())],
                vec![CellValue::Int(3), CellValue::Text("Gamma".into())],
            ],
            more_rows: false,
            elapsed_ms: 12,
        };
        let enc = encode(&result, 10_000).unwrap();
        assert!(!enc.truncated);
        assert!(enc.text.starts_with("rows[3/3]{id,name}:"));
        assert_eq!(enc.text.lines().count(), 4);

        let dec = decode(&enc.text).unwrap();
        assert_eq!(dec.rows.len(), 3);
        assert_eq!(dec.rows[2][1], CellValue::Text("Gamma".into()));
    }
}
