//! Tool registry
//!
//! Catalog of tools in registration order. Populated once at startup and
//! shared read-only afterwards.

use crate::mcp::protocol::CallToolResult;
use crate::mcp::schema::InputSchema;
use crate::types::{RegistryError, ToolError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Advertised description of a tool, as sent in `tools/list`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

/// Type-erased handler invoked by the dispatcher with validated arguments.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Map<String, Value>) -> Result<CallToolResult, ToolError>;
}

/// A tool with a typed argument bundle.
///
/// Implementors are registered with [`ToolRegistry::register`], which wraps
/// them so arguments are deserialized into `Args` before `call` runs.
#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Args: DeserializeOwned + Send;

    fn descriptor(&self) -> ToolDescriptor;

    async fn call(&self, args: Self::Args) -> Result<CallToolResult, ToolError>;
}

struct TypedHandler<T>(T);

#[async_trait]
impl<T: Tool> ToolHandler for TypedHandler<T> {
    async fn call(&self, arguments: Map<String, Value>) -> Result<CallToolResult, ToolError> {
        let args: T::Args = serde_json::from_value(Value::Object(arguments))
            .map_err(|e| ToolError::InvalidArgument(format!("Invalid arguments: {}", e)))?;
        self.0.call(args).await
    }
}

pub struct RegisteredTool {
    pub descriptor: ToolDescriptor,
    pub handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: Tool>(&mut self, tool: T) -> Result<(), RegistryError> {
        let descriptor = tool.descriptor();
        self.register_handler(descriptor, Arc::new(TypedHandler(tool)))
    }

    pub fn register_handler(
        &mut self,
        descriptor: ToolDescriptor,
        handler: Arc<dyn ToolHandler>,
    ) -> Result<(), RegistryError> {
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateToolName(descriptor.name));
        }

        self.index.insert(descriptor.name.clone(), self.tools.len());
        self.tools.push(RegisteredTool {
            descriptor,
            handler,
        });
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&RegisteredTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Descriptors in registration order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
