use std::path::PathBuf;
use thiserror::Error;

/// Transport and session level failures.
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Frame exceeds maximum length of {0} bytes")]
    FrameTooLarge(usize),

    #[error("Framing error: {0}")]
    Codec(String),

    #[error("Outgoing message channel closed")]
    WriterClosed,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl McpError {
    /// Whether the session must stop after this error.
    ///
    /// An oversized frame is discarded by the codec up to the next newline,
    /// so the stream stays aligned and the session can keep going.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, McpError::FrameTooLarge(_))
    }
}

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Tool '{0}' is already registered")]
    DuplicateToolName(String),
}

/// Failures raised while running a single tool call.
///
/// None of these escape the dispatcher; each becomes an error result.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    Downstream(#[from] DbError),

    #[error("Timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Handler panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    /// Errors the caller caused, as opposed to failures while executing.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, ToolError::UnknownTool(_) | ToolError::InvalidArgument(_))
    }
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Connection timed out after {0}s")]
    ConnectTimeout(u64),

    #[error("{0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Unexpected result shape: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
