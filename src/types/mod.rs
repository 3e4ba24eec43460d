//! Shared error types

mod errors;

pub use errors::{ConfigError, DbError, McpError, RegistryError, ToolError};
