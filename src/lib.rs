//! sqlmcp - SQL tools over the Model Context Protocol
//!
//! This crate exposes a relational database to MCP clients (like Claude Code)
//! as a small set of tools: run a query, list tables, describe a table. It
//! speaks newline-delimited JSON-RPC over stdio.

pub mod config;
pub mod db;
pub mod mcp;
pub mod types;

pub use config::{Config, ConfigLoader};
pub use db::{DataStore, PgStore};
pub use mcp::{Session, ToolRegistry};
pub use types::{McpError, ToolError};
