//! Error types for the sandbox crate.

use thiserror::Error;

/// Errors surfaced by sandboxed execution.
///
/// Script-side failures carry only the child's own message; host stack
/// frames, paths and internals never leak into them.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// The interpreter process could not be started.
    #[error("failed to start sandbox: {0}")]
    Spawn(String),

    /// Wall-clock timeout expired; the child was killed.
    #[error("script exceeded the {seconds}s execution timeout")]
    Timeout { seconds: u64 },

    /// The memory ceiling (or another resource limit) was hit.
    #[error("script hit a resource limit: {message}")]
    ResourceLimit { message: String },

    /// The script itself raised or failed to compile.
    #[error("script error: {message}")]
    Script { message: String },

    /// The child died without producing a result envelope.
    #[error("sandbox crashed: {message}")]
    Crashed { message: String },

    /// Host-side plumbing failure (scratch dir, pipes).
    #[error("sandbox internal error: {0}")]
    Internal(String),
}

impl SandboxError {
    /// Stable machine-readable kind, used in the protocol error payload.
    pub fn kind(&self) -> &'static str {
        "sandbox_error"
    }

    /// Whether this is a resource-limit breach (timeout or ceiling).
    pub fn is_resource_limit(&self) -> bool {
        matches!(
            self,
            SandboxError::Timeout { .. } | SandboxError::ResourceLimit { .. }
        )
    }
}

impl From<std::io::Error> for SandboxError {
    fn from(err: std::io::Error) -> Self {
        SandboxError::Internal(err.to_string())
    }
}
