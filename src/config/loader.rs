//! Configuration loader with 3-tier precedence
//!
//! Priority order (highest to lowest):
//! 1. Environment variables (SQL_SERVER, SQL_DATABASE, SQL_USER, SQL_PASSWORD)
//! 2. Config file (--config, ./.sqlmcp.toml, $SQLMCP_CONFIG or
//!    ~/.config/sqlmcp/config.toml, first one found)
//! 3. Built-in defaults

use crate::config::defaults::*;
use crate::config::settings::{parse_server_address, Config};
use crate::config::user_config::UserConfig;
use crate::types::ConfigError;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct ConfigLoader {
    explicit: Option<PathBuf>,
    candidates: Vec<PathBuf>,
}

impl ConfigLoader {
    /// Loader that searches the standard locations. An `explicit` path
    /// (from `--config`) is used instead of the search and must exist.
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self {
            explicit,
            candidates: Self::default_candidates(),
        }
    }

    pub fn with_candidates(explicit: Option<PathBuf>, candidates: Vec<PathBuf>) -> Self {
        Self {
            explicit,
            candidates,
        }
    }

    fn default_candidates() -> Vec<PathBuf> {
        let mut candidates = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            candidates.push(cwd.join(".sqlmcp.toml"));
        }

        if let Ok(config_path) = std::env::var(ENV_CONFIG_PATH) {
            candidates.push(PathBuf::from(config_path));
        }

        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("sqlmcp").join("config.toml"));
        }

        candidates
    }

    pub fn load(&self) -> Result<Config, ConfigError> {
        self.load_with_env(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load) with environment lookups going through `env`.
    pub fn load_with_env<F>(&self, env: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(user_config) = self.load_user_config()? {
            apply_user_config(&mut config, user_config);
        }

        apply_env(&mut config, env)?;
        config.validate()?;

        if !config.database.has_password() {
            warn!(
                "No database password configured; set {} or [database].password",
                ENV_PASSWORD
            );
        }

        info!(
            "Database target: {}@{}:{}/{}",
            config.database.user, config.database.host, config.database.port, config.database.database
        );

        Ok(config)
    }

    fn load_user_config(&self) -> Result<Option<UserConfig>, ConfigError> {
        if let Some(path) = &self.explicit {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.clone()));
            }
            return read_user_config(path).map(Some);
        }

        for path in &self.candidates {
            if path.exists() {
                return read_user_config(path).map(Some);
            }
        }

        debug!("No config file found");
        Ok(None)
    }
}

fn read_user_config(path: &Path) -> Result<UserConfig, ConfigError> {
    debug!("Loading config from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn apply_user_config(config: &mut Config, user: UserConfig) {
    let db = &mut config.database;
    let section = user.database;
    if let Some(host) = section.host {
        db.host = host;
    }
    if let Some(port) = section.port {
        db.port = port;
    }
    if let Some(database) = section.database {
        db.database = database;
    }
    if let Some(user) = section.user {
        db.user = user;
    }
    if section.password.is_some() {
        db.password = section.password;
    }
    if let Some(secs) = section.connect_timeout_secs {
        db.connect_timeout_secs = secs;
    }
    if let Some(mode) = section.ssl_mode {
        db.ssl_mode = mode;
    }

    let server = &mut config.server;
    let section = user.server;
    if let Some(name) = section.name {
        server.name = name;
    }
    if section.instructions.is_some() {
        server.instructions = section.instructions;
    }
    if let Some(secs) = section.tool_timeout_secs {
        server.tool_timeout_secs = secs;
    }
    if let Some(n) = section.max_concurrent_calls {
        server.max_concurrent_calls = n;
    }
    if let Some(n) = section.max_frame_bytes {
        server.max_frame_bytes = n;
    }
    if let Some(ms) = section.shutdown_grace_ms {
        server.shutdown_grace_ms = ms;
    }
    if let Some(n) = section.display_rows {
        server.display_rows = n;
    }
}

fn apply_env<F>(config: &mut Config, env: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    // Empty variables count as unset.
    let lookup = |key: &str| env(key).filter(|v| !v.trim().is_empty());
    let db = &mut config.database;

    if let Some(address) = lookup(ENV_SERVER) {
        let (host, port) = parse_server_address(&address)?;
        db.host = host;
        if let Some(port) = port {
            db.port = port;
        }
    }
    if let Some(database) = lookup(ENV_DATABASE) {
        db.database = database;
    }
    if let Some(user) = lookup(ENV_USER) {
        db.user = user;
    }
    if let Some(password) = lookup(ENV_PASSWORD) {
        db.password = Some(password);
    }

    Ok(())
}
