//! Sandbox settings for the script execution tool.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the process-isolated script runner.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Interpreter invoked inside the sandbox.
    #[serde(default = "default_interpreter")]
    pub interpreter: PathBuf,

    /// Maximum concurrent sandbox executions (slot pool size).
    #[serde(default = "default_max_slots")]
    pub max_slots: usize,

    /// Default wall-clock timeout per run, in seconds. Callers may lower it
    /// per request but never exceed `max_timeout_seconds`.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Hard ceiling on per-run timeout requests.
    #[serde(default = "default_max_timeout_seconds")]
    pub max_timeout_seconds: u64,

    /// Address-space ceiling for the child process, in megabytes.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    /// Captured stdout cap in bytes. Overflow is cut with an explicit marker.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: usize,

    /// Maximum pre-executed context queries per run.
    #[serde(default = "default_max_context_queries")]
    pub max_context_queries: usize,

    /// Detach the child into fresh user+network namespaces so it has no
    /// network. Requires unprivileged user namespaces; disable where the
    /// kernel forbids them and rely on an external jailer instead.
    #[serde(default = "default_isolate_namespaces")]
    pub isolate_namespaces: bool,

    /// Root for per-run scratch directories. Defaults to the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            interpreter: default_interpreter(),
            max_slots: default_max_slots(),
            timeout_seconds: default_timeout_seconds(),
            max_timeout_seconds: default_max_timeout_seconds(),
            memory_mb: default_memory_mb(),
            max_output_bytes: default_max_output_bytes(),
            max_context_queries: default_max_context_queries(),
            isolate_namespaces: default_isolate_namespaces(),
            scratch_root: None,
        }
    }
}

impl SandboxConfig {
    /// Clamp a caller-requested timeout into the configured range.
    pub fn clamp_timeout(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.timeout_seconds)
            .clamp(1, self.max_timeout_seconds)
    }
}

fn default_interpreter() -> PathBuf {
    PathBuf::from("python3")
}

fn default_max_slots() -> usize {
    4
}

fn default_timeout_seconds() -> u64 {
    10
}

fn default_max_timeout_seconds() -> u64 {
    30
}

fn default_memory_mb() -> u64 {
    256
}

fn default_max_output_bytes() -> usize {
    64 * 1024
}

fn default_max_context_queries() -> usize {
    10
}

fn default_isolate_namespaces() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_timeout() {
        let config = SandboxConfig::default();
        assert_eq!(config.clamp_timeout(None), 10);
        assert_eq!(config.clamp_timeout(Some(5)), 5);
        assert_eq!(config.clamp_timeout(Some(300)), 30);
        assert_eq!(config.clamp_timeout(Some(0)), 1);
    }
}
