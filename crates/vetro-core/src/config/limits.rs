//! Execution limits applied to every tool invocation.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits for query execution and response shaping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum rows materialized per query. The executor fetches one probe
    /// row past the cap to decide the "more rows" flag.
    #[serde(default = "default_row_cap")]
    pub row_cap: usize,

    /// Maximum wall-clock execution time per statement, in milliseconds.
    /// Enforced server-side (statement_timeout) and client-side.
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,

    /// Maximum serialized response size in bytes. Rows are dropped from the
    /// tail of the encoding, never split, to fit this bound.
    #[serde(default = "default_byte_cap")]
    pub byte_cap: usize,

    /// Maximum characters per text cell before the cell is clamped to a
    /// head/tail preview. 0 disables clamping.
    #[serde(default = "default_max_cell_chars")]
    pub max_cell_chars: usize,

    /// Characters shown from each end of a clamped cell.
    #[serde(default = "default_cell_preview_chars")]
    pub cell_preview_chars: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            row_cap: default_row_cap(),
            statement_timeout_ms: default_statement_timeout_ms(),
            byte_cap: default_byte_cap(),
            max_cell_chars: default_max_cell_chars(),
            cell_preview_chars: default_cell_preview_chars(),
        }
    }
}

impl ExecutionLimits {
    pub fn statement_timeout(&self) -> Duration {
        Duration::from_millis(self.statement_timeout_ms)
    }
}

fn default_row_cap() -> usize {
    1000
}

fn default_statement_timeout_ms() -> u64 {
    30_000
}

fn default_byte_cap() -> usize {
    8_000
}

fn default_max_cell_chars() -> usize {
    200
}

fn default_cell_preview_chars() -> usize {
    80
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let limits = ExecutionLimits::default();
        assert_eq!(limits.row_cap, 1000);
        assert_eq!(limits.statement_timeout(), Duration::from_secs(30));
        assert_eq!(limits.byte_cap, 8_000);
    }
}
