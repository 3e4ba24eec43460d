//! MCP server and tools module

pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod session;
pub mod tools;
pub mod transport;

pub use dispatcher::{Dispatcher, InvocationRequest};
pub use registry::{Tool, ToolDescriptor, ToolHandler, ToolRegistry};
pub use session::{Session, SessionState};
pub use tools::register_sql_tools;
pub use transport::{stdio, MessageReader, MessageWriter};
