//! Sandbox slot pool.
//!
//! Bounds concurrent executions with a semaphore. The permit is held for the
//! duration of one run and released by RAII on every path - success, script
//! failure, timeout - so a wedged or killed run can never leak a slot.

use std::sync::Arc;

use tokio::sync::Semaphore;

use vetro_core::SandboxConfig;

use crate::error::SandboxError;
use crate::request::{SandboxRequest, SandboxResult};
use crate::runner::run_isolated;

/// Pool of sandbox execution slots.
pub struct SandboxPool {
    config: SandboxConfig,
    slots: Arc<Semaphore>,
}

impl SandboxPool {
    pub fn new(config: SandboxConfig) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_slots));
        Self { config, slots }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Slots currently free (used by health reporting and tests).
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }

    /// Execute one request. Waits for a free slot, runs the child process to
    /// completion (or timeout), and returns the captured result.
    pub async fn run(&self, request: SandboxRequest) -> Result<SandboxResult, SandboxError> {
        let _permit = self
            .slots
            .acquire()
            .await
            .map_err(|_| SandboxError::Internal("sandbox pool is closed".to_string()))?;

        tracing::debug!(
            code_len = request.code.len(),
            timeout_seconds = request.timeout_seconds,
            context_queries = request.context.len(),
            "sandbox run starting"
        );
        run_isolated(&self.config, &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// These tests exercise the real child process path; they are skipped on
    /// machines without a python3 on PATH. Namespace detachment is disabled
    /// because unprivileged user namespaces are not available everywhere the
    /// suite runs.
    fn test_config() -> SandboxConfig {
        SandboxConfig {
            isolate_namespaces: false,
            ..SandboxConfig::default()
        }
    }

    fn python3_available() -> bool {
        std::process::Command::new("python3")
            .arg("--version")
            .output()
            .is_ok()
    }

    fn request(code: &str) -> SandboxRequest {
        SandboxRequest {
            code: code.to_string(),
            timeout_seconds: 10,
            context: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_final_expression_is_the_result() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let result = pool
            .run(request("x = 2 + 2\nx * 10"))
            .await
            .expect("run succeeds");
        assert_eq!(result.value, Some(serde_json::json!(40)));
        assert!(result.stdout.is_none());
    }

    #[tokio::test]
    async fn test_stdout_is_captured() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let result = pool
            .run(request("print(\"hello from inside\")"))
            .await
            .expect("run succeeds");
        assert!(result.stdout.unwrap().contains("hello from inside"));
        assert!(!result.stdout_truncated);
    }

    #[tokio::test]
    async fn test_stdout_overflow_is_marked() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let mut config = test_config();
        config.max_output_bytes = 128;
        let pool = SandboxPool::new(config);
        let result = pool
            .run(request("for i in range(1000):\n    print(i)"))
            .await
            .expect("run succeeds");
        assert!(result.stdout_truncated);
        assert!(result.stdout.unwrap().ends_with("…[output truncated]"));
    }

    #[tokio::test]
    async fn test_script_exception_is_sanitized() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let err = pool.run(request("1 / 0")).await.unwrap_err();
        match err {
            SandboxError::Script { message } => {
                assert!(message.contains("ZeroDivisionError"));
                assert!(!message.contains("/tmp"));
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_imports_are_blocked() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let err = pool.run(request("import os\nos.getcwd()")).await.unwrap_err();
        assert!(matches!(err, SandboxError::Script { .. }));
    }

    #[tokio::test]
    async fn test_timeout_kills_and_releases_slot() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let max = pool.available_slots();

        let mut req = request("while True:\n    pass");
        req.timeout_seconds = 1;
        let err = pool.run(req).await.unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { seconds: 1 }));
        assert!(err.is_resource_limit());

        // The slot came back despite the kill.
        assert_eq!(pool.available_slots(), max);
    }

    #[tokio::test]
    async fn test_bound_context_reaches_the_script() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let mut context = HashMap::new();
        context.insert(
            "SELECT status FROM tasks".to_string(),
            serde_json::json!([
                {"status": "done"},
                {"status": "done"},
                {"status": "open"},
            ]),
        );
        let result = pool
            .run(SandboxRequest {
                code: concat!(
                    "rows = db_query(\"SELECT status FROM tasks\")\n",
                    "by_status = Counter(r[\"status\"] for r in rows)\n",
                    "dict(by_status)\n",
                )
                .to_string(),
                timeout_seconds: 10,
                context,
            })
            .await
            .expect("run succeeds");
        assert_eq!(
            result.value,
            Some(serde_json::json!({"done": 2, "open": 1}))
        );
    }

    #[tokio::test]
    async fn test_unbound_query_raises_inside() {
        if !python3_available() {
            eprintln!("skipping: python3 not available");
            return;
        }
        let pool = SandboxPool::new(test_config());
        let err = pool
            .run(request("db_query(\"SELECT 1\")"))
            .await
            .unwrap_err();
        match err {
            SandboxError::Script { message } => {
                assert!(message.contains("not pre-bound"), "message: {message}")
            }
            other => panic!("expected script error, got {other:?}"),
        }
    }
}
