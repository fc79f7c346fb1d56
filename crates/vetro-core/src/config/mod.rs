//! Configuration types for the Vetro gateway.
//!
//! Configuration is loaded from a YAML file (vetro.yaml) once at process
//! start; secrets are referenced through environment variable names rather
//! than stored inline. The loaded struct is immutable for the lifetime of the
//! process and is passed into each component at construction.

pub mod limits;
pub mod mcp;
pub mod sandbox;
pub mod upstream;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub use limits::ExecutionLimits;
pub use mcp::{McpConfig, Transport};
pub use sandbox::SandboxConfig;
pub use upstream::{ConnectionPoolConfig, SslMode, UpstreamConfig};

/// Complete Vetro configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VetroConfig {
    /// Project name, used in server info.
    #[serde(default)]
    pub project: Option<String>,

    /// Upstream Postgres connection. The credential is expected to be
    /// restricted to read-only privileges; the statement guard is defense in
    /// depth on top of that.
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Execution limits applied to every tool invocation.
    #[serde(default)]
    pub limits: ExecutionLimits,

    /// Sandbox settings for the script execution tool.
    #[serde(default)]
    pub sandbox: SandboxConfig,

    /// MCP transport settings.
    #[serde(default)]
    pub mcp: McpConfig,

    /// Schemas visible to introspection and tools. Empty means "public" only.
    #[serde(default = "default_schemas")]
    pub schemas: Vec<String>,
}

fn default_schemas() -> Vec<String> {
    vec!["public".to_string()]
}

impl VetroConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: VetroConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Build a configuration from environment variables only
    /// (DATABASE_URL, VETRO_PORT, VETRO_HOST). Used when no config file is
    /// given on the command line.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = VetroConfig::default();
        config.upstream.database_url_env = Some("DATABASE_URL".to_string());
        if let Ok(port) = std::env::var("VETRO_PORT")
            && let Ok(port) = port.parse()
        {
            config.mcp.port = port;
        }
        if let Ok(host) = std::env::var("VETRO_HOST") {
            config.mcp.host = host;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.row_cap == 0 {
            return Err(ConfigError::Invalid("limits.row_cap must be at least 1".into()));
        }
        if self.limits.byte_cap < 64 {
            return Err(ConfigError::Invalid(
                "limits.byte_cap must be at least 64 bytes".into(),
            ));
        }
        if self.sandbox.max_slots == 0 {
            return Err(ConfigError::Invalid("sandbox.max_slots must be at least 1".into()));
        }
        Ok(())
    }

    /// Schemas formatted for an `IN (...)` clause.
    pub fn schema_list_sql(&self) -> String {
        self.schemas
            .iter()
            .map(|s| format!("'{}'", s.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = VetroConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.schemas, vec!["public"]);
    }

    #[test]
    fn test_load_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
project: acme-reader
upstream:
  host: db.internal
  port: 5433
  database: acme
  username: readonly
limits:
  row_cap: 200
  statement_timeout_ms: 10000
schemas: [public, teamwork]
"#
        )
        .unwrap();

        let config = VetroConfig::from_file(file.path()).unwrap();
        assert_eq!(config.project.as_deref(), Some("acme-reader"));
        assert_eq!(config.upstream.host, "db.internal");
        assert_eq!(config.limits.row_cap, 200);
        assert_eq!(config.limits.statement_timeout_ms, 10_000);
        assert_eq!(config.schemas.len(), 2);
    }

    #[test]
    fn test_rejects_zero_row_cap() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "limits:\n  row_cap: 0").unwrap();
        assert!(matches!(
            VetroConfig::from_file(file.path()),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_schema_list_sql_quotes() {
        let config = VetroConfig {
            schemas: vec!["public".into(), "it's".into()],
            ..Default::default()
        };
        assert_eq!(config.schema_list_sql(), "'public', 'it''s'");
    }
}
