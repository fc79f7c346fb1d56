//! # vetro-sandbox
//!
//! Process-isolated execution of caller-supplied analysis scripts.
//!
//! Each run spawns a fresh interpreter process with a cleared environment,
//! an ephemeral scratch directory as its working directory, an address-space
//! rlimit as the memory ceiling and - where the kernel allows unprivileged
//! user namespaces - detachment into fresh user+network namespaces so the
//! child has no network. The host's secrets, environment and state are not
//! reachable from the script. Inside the child, a small driver executes the
//! script against a restricted builtin surface and the pre-bound data
//! context, then writes a result envelope the host picks up.
//!
//! Runs are pooled: a fixed number of slots bounds concurrency, and a
//! timed-out or failed run releases its slot and scratch directory exactly
//! like a successful one. Concurrent runs share nothing.

pub mod context;
pub mod error;
pub mod pool;
pub mod request;
pub mod runner;

pub use context::scan_query_literals;
pub use error::SandboxError;
pub use pool::SandboxPool;
pub use request::{SandboxRequest, SandboxResult};
