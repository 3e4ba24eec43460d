//! Configuration file parsing

use serde::{Deserialize, Serialize};

/// Contents of a `config.toml`. Every field is optional; missing values fall
/// back to the built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub server: ServerSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseSection {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub connect_timeout_secs: Option<u64>,
    pub ssl_mode: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    pub name: Option<String>,
    pub instructions: Option<String>,
    pub tool_timeout_secs: Option<u64>,
    pub max_concurrent_calls: Option<usize>,
    pub max_frame_bytes: Option<usize>,
    pub shutdown_grace_ms: Option<u64>,
    pub display_rows: Option<usize>,
}
