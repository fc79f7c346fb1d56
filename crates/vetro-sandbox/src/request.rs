//! Sandbox request and response types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single sandboxed execution: caller-supplied code plus the data context
/// bound before launch. Created per invocation, executed once, discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxRequest {
    /// Script source. The value of its last expression becomes the result.
    pub code: String,

    /// Wall-clock timeout in seconds (already clamped by the caller).
    pub timeout_seconds: u64,

    /// Pre-bound data context: normalized SQL text -> rows (as JSON). The
    /// only data visible to the script beyond what it computes itself.
    #[serde(default)]
    pub context: HashMap<String, serde_json::Value>,
}

/// Response from a completed execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxResult {
    /// Captured standard output, if any. Bounded; see `stdout_truncated`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,

    /// Output exceeded the cap and was cut with an explicit marker.
    pub stdout_truncated: bool,

    /// Value of the script's final expression, JSON-serialized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,

    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}
