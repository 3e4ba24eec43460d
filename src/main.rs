use anyhow::{Context, Result};
use clap::Parser;
use sqlmcp::config::ConfigLoader;
use sqlmcp::db::{DataStore, PgStore};
use sqlmcp::mcp::{register_sql_tools, stdio, Session, ToolRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

/// SQL tools for the Model Context Protocol
///
/// Exposes a PostgreSQL database to MCP clients over stdio. Connection
/// settings come from SQL_SERVER, SQL_DATABASE, SQL_USER and SQL_PASSWORD,
/// or from a config file.
#[derive(Parser, Debug)]
#[command(name = "sqlmcp")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file to use instead of the standard search locations
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log to file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn setup_logging(log_level: &str, log_file: Option<PathBuf>) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // Stdout carries protocol frames only.
    let subscriber = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    if let Some(log_path) = log_file {
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;
        subscriber.with_writer(file).init();
    } else {
        subscriber.with_writer(std::io::stderr).init();
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.log_file)?;

    info!("Starting sqlmcp v{}", env!("CARGO_PKG_VERSION"));

    let config = ConfigLoader::new(args.config)
        .load()
        .context("Failed to load configuration")?;

    info!("Configuration loaded successfully");

    let store: Arc<dyn DataStore> =
        Arc::new(PgStore::new(&config.database).context("Invalid database settings")?);

    let mut registry = ToolRegistry::new();
    register_sql_tools(&mut registry, store, config.server.display_rows)?;
    info!("Registered {} tools", registry.len());

    let mut session = Session::new(Arc::new(registry), &config.server);
    let (reader, writer) = stdio(config.server.max_frame_bytes);

    info!("sqlmcp server starting - ready to accept MCP requests on stdio");

    // Runs until the client closes stdin
    if let Err(e) = session.run(reader, writer).await {
        error!("MCP session error: {}", e);
        return Err(e.into());
    }

    info!("sqlmcp shut down successfully");

    Ok(())
}
