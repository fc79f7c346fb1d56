//! Cell clamping.
//!
//! Oversized text cells are cut to a head/tail preview before encoding so a
//! single huge value cannot eat the whole response budget. Clamping is lossy
//! and happens upstream of the encoder; the encoding itself stays exact for
//! whatever it is given. Clamped responses carry a `cells_clamped` flag in
//! their metadata.

use vetro_core::{CellValue, QueryResult};

/// Clamp one text value to `max_chars`, keeping `preview_chars` from each
/// end: `head…[N chars]…tail`. Returns the value and whether it was cut.
pub fn clamp_cell(value: &str, max_chars: usize, preview_chars: usize) -> (String, bool) {
    let total = value.chars().count();
    if max_chars == 0 || total <= max_chars {
        return (value.to_string(), false);
    }

    let head: String = value.chars().take(preview_chars).collect();
    let tail: String = value
        .chars()
        .skip(total.saturating_sub(preview_chars))
        .collect();
    let omitted = total - head.chars().count() - tail.chars().count();
    (format!("{head}…[{omitted} chars]…{tail}"), true)
}

/// Clamp every oversized text/JSON cell in a result in place. Returns true
/// if any cell was cut.
pub fn clamp_result(result: &mut QueryResult, max_chars: usize, preview_chars: usize) -> bool {
    if max_chars == 0 {
        return false;
    }

    let mut clamped = false;
    for row in &mut result.rows {
        for cell in row {
            match cell {
                CellValue::Text(s) => {
                    let (value, cut) = clamp_cell(s, max_chars, preview_chars);
                    if cut {
                        *s = value;
                        clamped = true;
                    }
                }
                CellValue::Json(v) => {
                    let rendered = v.to_string();
                    let (value, cut) = clamp_cell(&rendered, max_chars, preview_chars);
                    if cut {
                        *cell = CellValue::Text(value);
                        clamped = true;
                    }
                }
                _ => {}
            }
        }
    }
    clamped
}

#[cfg(test)]
mod tests {
    use super::*;
    use vetro_core::Column;

    #[test]
    fn test_short_values_untouched() {
        let (v, cut) = clamp_cell("short", 200, 80);
        assert_eq!(v, "short");
        assert!(!cut);
    }

    #[test]
    fn test_long_value_gets_preview() {
        let long = "a".repeat(50) + &"b".repeat(50);
        let (v, cut) = clamp_cell(&long, 40, 10);
        assert!(cut);
        assert_eq!(v, format!("{}…[80 chars]…{}", "a".repeat(10), "b".repeat(10)));
    }

    #[test]
    fn test_multibyte_boundaries() {
        let value = "ß".repeat(100);
        let (v, cut) = clamp_cell(&value, 40, 10);
        assert!(cut);
        assert!(v.starts_with(&"ß".repeat(10)));
        assert!(v.ends_with(&"ß".repeat(10)));
    }

    #[test]
    fn test_clamp_result_flags() {
        let mut result = QueryResult {
            columns: vec![Column::new("body", "TEXT")],
            rows: vec![
                vec![CellValue::Text("fine".into())],
                vec![CellValue::Text("x".repeat(500))],
            ],
            more_rows: false,
            elapsed_ms: 0,
        };
        assert!(clamp_result(&mut result, 200, 80));
        match &result.rows[1][0] {
            CellValue::Text(s) => assert!(s.contains("…[340 chars]…")),
            other => panic!("unexpected cell: {other:?}"),
        }
    }

    #[test]
    fn test_zero_disables_clamping() {
        let mut result = QueryResult {
            columns: vec![Column::new("body", "TEXT")],
            rows: vec![vec![CellValue::Text("y".repeat(10_000))]],
            more_rows: false,
            elapsed_ms: 0,
        };
        assert!(!clamp_result(&mut result, 0, 80));
    }
}
