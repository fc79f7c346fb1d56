use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use vetro_core::{Transport, VetroConfig};
use vetro_db::{introspect, Database};
use vetro_guard::StatementGuard;
use vetro_mcp::{McpServer, ServerState};

#[derive(Parser, Debug)]
#[command(name = "vetro", version, about = "Read-only database gateway for AI agents")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MCP server.
    Serve {
        /// Path to vetro.yaml. Falls back to environment configuration
        /// (DATABASE_URL, VETRO_HOST, VETRO_PORT) when omitted.
        #[arg(long, env = "VETRO_CONFIG")]
        config: Option<PathBuf>,

        /// Override the configured transport.
        #[arg(long, value_enum)]
        transport: Option<TransportArg>,
    },

    /// Print the compact database schema.
    Schema {
        #[arg(long, env = "VETRO_CONFIG")]
        config: Option<PathBuf>,

        /// Restrict to one schema.
        #[arg(long)]
        schema: Option<String>,

        /// Restrict to one table.
        #[arg(long)]
        table: Option<String>,
    },

    /// Validate a SQL statement against the read-only guard.
    Check {
        /// The statement to classify.
        sql: String,
    },

    /// Execute one read-only query and print the compacted result.
    Query {
        #[arg(long, env = "VETRO_CONFIG")]
        config: Option<PathBuf>,

        /// The statement to run.
        sql: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportArg {
    Stdio,
    Http,
}

impl From<TransportArg> for Transport {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Transport::Stdio,
            TransportArg::Http => Transport::Http,
        }
    }
}

fn load_config(path: &Option<PathBuf>) -> anyhow::Result<VetroConfig> {
    let config = match path {
        Some(path) => VetroConfig::from_file(path)?,
        None => VetroConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Protocol traffic owns stdout in stdio mode; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Serve { config, transport } => {
            let mut config = load_config(&config)?;
            if let Some(transport) = transport {
                config.mcp.transport = transport.into();
            }

            let database = Database::connect(&config.upstream).await?;
            let server = McpServer::new(ServerState::new(config, Some(database)));
            server.run().await?;
        }

        Command::Schema {
            config,
            schema,
            table,
        } => {
            let config = load_config(&config)?;
            let database = Database::connect(&config.upstream).await?;

            let schemas = match schema {
                Some(schema) => vec![schema],
                None => config.schemas.clone(),
            };
            let info =
                introspect::introspect(database.pool(), &schemas, table.as_deref()).await?;
            println!("{}", introspect::render_compact(&info));
            tracing::info!(
                tables = info.table_count(),
                columns = info.column_count(),
                "schema printed"
            );
        }

        Command::Check { sql } => {
            let guard = StatementGuard::new();
            match guard.validate(&sql) {
                Ok(statement) => {
                    println!("accepted (tables: {})", statement.tables().join(", "));
                }
                Err(reason) => {
                    println!("rejected: {reason}");
                    std::process::exit(1);
                }
            }
        }

        Command::Query { config, sql } => {
            let config = load_config(&config)?;
            let database = Database::connect(&config.upstream).await?;
            let guard = StatementGuard::new();

            let statement = guard.validate(&sql)?;
            let mut result = database.execute(&statement, &config.limits).await?;
            vetro_toon::clamp_result(
                &mut result,
                config.limits.max_cell_chars,
                config.limits.cell_preview_chars,
            );
            let encoding = vetro_toon::encode(&result, config.limits.byte_cap)?;

            println!("{}", encoding.text);
            eprintln!(
                "-- {} of {} rows in {}ms{}",
                encoding.rows_emitted,
                encoding.rows_total,
                result.elapsed_ms,
                if encoding.truncated { " (truncated)" } else { "" }
            );
        }
    }

    Ok(())
}
