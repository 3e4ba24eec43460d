//! Built-in configuration defaults

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 5432;
pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_USER: &str = "postgres";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_SSL_MODE: &str = "prefer";

pub const DEFAULT_SERVER_NAME: &str = "sqlmcp";
pub const DEFAULT_INSTRUCTIONS: &str = "Run SQL against the connected database. \
Use list_tables and describe_table to explore the schema before writing queries.";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2_000;

/// Rows shown in full by `execute_sql` before the rest are summarized.
pub const DEFAULT_DISPLAY_ROWS: usize = 10;

// Environment variables read by the loader
pub const ENV_SERVER: &str = "SQL_SERVER";
pub const ENV_DATABASE: &str = "SQL_DATABASE";
pub const ENV_USER: &str = "SQL_USER";
pub const ENV_PASSWORD: &str = "SQL_PASSWORD";
pub const ENV_CONFIG_PATH: &str = "SQLMCP_CONFIG";
