//! Configuration system for sqlmcp
//!
//! Provides a 3-tier configuration hierarchy:
//! 1. Environment variables (highest priority)
//! 2. Config file
//! 3. Built-in defaults (lowest priority)

pub mod defaults;
mod loader;
mod settings;
mod user_config;

pub use loader::ConfigLoader;
pub use settings::{parse_server_address, Config, DatabaseConfig, ServerConfig};
pub use user_config::{DatabaseSection, ServerSection, UserConfig};
