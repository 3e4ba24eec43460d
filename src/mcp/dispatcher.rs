//! Tool dispatcher
//!
//! Turns an invocation into exactly one [`CallToolResult`]. Unknown tools,
//! schema violations, handler errors, timeouts and panics all become error
//! results here; nothing propagates to the session.

use crate::mcp::protocol::{CallToolResult, RequestId};
use crate::mcp::registry::ToolRegistry;
use crate::types::ToolError;
use futures::FutureExt;
use serde_json::{Map, Value};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, warn};

/// A decoded `tools/call` request.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub id: RequestId,
    pub name: String,
    pub arguments: Map<String, Value>,
}

pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    call_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<ToolRegistry>, call_timeout: Duration) -> Self {
        Self {
            registry,
            call_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub async fn dispatch(&self, request: InvocationRequest) -> CallToolResult {
        debug!(id = %request.id, tool = %request.name, "Dispatching tool call");

        match self.invoke(&request).await {
            Ok(result) => result,
            Err(e) if e.is_caller_error() => {
                warn!(id = %request.id, tool = %request.name, "Rejected tool call: {}", e);
                CallToolResult::error(e)
            }
            Err(e) => {
                error!(id = %request.id, tool = %request.name, "Tool execution error: {}", e);
                CallToolResult::execution_error(&request.name, e)
            }
        }
    }

    async fn invoke(&self, request: &InvocationRequest) -> Result<CallToolResult, ToolError> {
        let tool = self
            .registry
            .lookup(&request.name)
            .ok_or_else(|| ToolError::UnknownTool(request.name.clone()))?;

        tool.descriptor
            .input_schema
            .validate(&request.arguments)
            .map_err(ToolError::InvalidArgument)?;

        let call = AssertUnwindSafe(tool.handler.call(request.arguments.clone())).catch_unwind();

        match timeout(self.call_timeout, call).await {
            Err(_) => Err(ToolError::Timeout(self.call_timeout)),
            Ok(Err(panic)) => Err(ToolError::Panicked(panic_message(panic))),
            Ok(Ok(outcome)) => outcome,
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
