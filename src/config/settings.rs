//! Resolved configuration values

use crate::config::defaults::*;
use crate::mcp::transport::DEFAULT_MAX_FRAME_BYTES;
use crate::types::ConfigError;
use std::fmt;
use std::time::Duration;

const SSL_MODES: &[&str] = &["disable", "allow", "prefer", "require", "verify-ca", "verify-full"];

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let db = &self.database;
        if db.host.trim().is_empty() {
            return Err(ConfigError::Invalid("database host is empty".to_string()));
        }
        if db.port == 0 {
            return Err(ConfigError::Invalid("database port must be non-zero".to_string()));
        }
        if db.database.trim().is_empty() {
            return Err(ConfigError::Invalid("database name is empty".to_string()));
        }
        if !SSL_MODES.contains(&db.ssl_mode.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown ssl_mode '{}' (expected one of: {})",
                db.ssl_mode,
                SSL_MODES.join(", ")
            )));
        }

        let server = &self.server;
        for (name, value) in [
            ("connect_timeout_secs", db.connect_timeout_secs),
            ("tool_timeout_secs", server.tool_timeout_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }
        for (name, value) in [
            ("max_concurrent_calls", server.max_concurrent_calls),
            ("max_frame_bytes", server.max_frame_bytes),
            ("display_rows", server.display_rows),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{} must be positive", name)));
            }
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub connect_timeout_secs: u64,
    pub ssl_mode: String,
}

impl DatabaseConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            user: DEFAULT_USER.to_string(),
            password: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            ssl_mode: DEFAULT_SSL_MODE.to_string(),
        }
    }
}

// Keeps the password out of logs.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: String,
    pub instructions: Option<String>,
    pub tool_timeout_secs: u64,
    pub max_concurrent_calls: usize,
    pub max_frame_bytes: usize,
    pub shutdown_grace_ms: u64,
    pub display_rows: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SERVER_NAME.to_string(),
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
            max_concurrent_calls: DEFAULT_MAX_CONCURRENT_CALLS,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            display_rows: DEFAULT_DISPLAY_ROWS,
        }
    }
}

/// Split a server address of the form `host`, `host:port` or `host,port`.
///
/// The comma form is what SQL Server style connection settings use. A bare
/// IPv6 address is returned unchanged; use `[addr]:port` to give it a port.
pub fn parse_server_address(address: &str) -> Result<(String, Option<u16>), ConfigError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(ConfigError::Invalid("server address is empty".to_string()));
    }

    let split = if let Some((host, port)) = address.split_once(',') {
        Some((host, port))
    } else if let Some(rest) = address.strip_prefix('[') {
        match rest.split_once(']') {
            Some((host, "")) => return Ok((host.to_string(), None)),
            Some((host, port)) => match port.strip_prefix(':') {
                Some(port) => Some((host, port)),
                None => {
                    return Err(ConfigError::Invalid(format!(
                        "malformed server address '{}'",
                        address
                    )))
                }
            },
            None => {
                return Err(ConfigError::Invalid(format!(
                    "malformed server address '{}'",
                    address
                )))
            }
        }
    } else {
        match address.rsplit_once(':') {
            Some((host, port)) if !host.contains(':') => Some((host, port)),
            _ => None,
        }
    };

    let Some((host, port)) = split else {
        return Ok((address.to_string(), None));
    };

    let host = host.trim();
    if host.is_empty() {
        return Err(ConfigError::Invalid(format!(
            "missing host in server address '{}'",
            address
        )));
    }

    let port: u16 = port.trim().parse().map_err(|_| {
        ConfigError::Invalid(format!("invalid port in server address '{}'", address))
    })?;

    Ok((host.to_string(), Some(port)))
}
