//! Shared server state.

use vetro_core::VetroConfig;
use vetro_db::Database;
use vetro_guard::StatementGuard;
use vetro_sandbox::SandboxPool;

/// Everything a tool invocation needs, constructed once at startup. The
/// configuration is immutable; the database pool and sandbox slot pool are
/// the only shared resources between invocations.
pub struct ServerState {
    pub config: VetroConfig,
    pub guard: StatementGuard,
    /// Absent when the server is started without an upstream (tool listing
    /// still works; data tools report an execution error).
    pub database: Option<Database>,
    pub sandbox: SandboxPool,
}

impl ServerState {
    pub fn new(config: VetroConfig, database: Option<Database>) -> Self {
        let sandbox = SandboxPool::new(config.sandbox.clone());
        Self {
            config,
            guard: StatementGuard::new(),
            database,
            sandbox,
        }
    }

    /// The database handle, or the error every data tool reports without one.
    pub fn database(&self) -> Result<&Database, vetro_db::DbError> {
        self.database
            .as_ref()
            .ok_or_else(|| vetro_db::DbError::Connect("database not configured".to_string()))
    }
}
