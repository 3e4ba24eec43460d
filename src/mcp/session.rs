//! MCP session
//!
//! Runs the protocol over a message transport: the `initialize` handshake,
//! `tools/list`, and `tools/call` fanned out to the dispatcher. Tool calls
//! run concurrently; each response goes back through a single writer task so
//! frames never interleave, and each carries the id of its own request.

use crate::config::ServerConfig;
use crate::mcp::dispatcher::{Dispatcher, InvocationRequest};
use crate::mcp::protocol::*;
use crate::mcp::registry::ToolRegistry;
use crate::mcp::transport::{MessageReader, MessageWriter};
use crate::types::McpError;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Handshaking,
    Ready,
    Closed,
}

type Outbox = mpsc::UnboundedSender<JsonRpcResponse>;

pub struct Session {
    dispatcher: Arc<Dispatcher>,
    server_info: Implementation,
    instructions: Option<String>,
    state: SessionState,
    call_slots: Arc<Semaphore>,
    shutdown_grace: Duration,
}

impl Session {
    pub fn new(registry: Arc<ToolRegistry>, config: &ServerConfig) -> Self {
        let dispatcher = Dispatcher::new(registry, Duration::from_secs(config.tool_timeout_secs));

        Self {
            dispatcher: Arc::new(dispatcher),
            server_info: Implementation {
                name: config.name.clone(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            instructions: config.instructions.clone(),
            state: SessionState::Uninitialized,
            call_slots: Arc::new(Semaphore::new(config.max_concurrent_calls)),
            shutdown_grace: Duration::from_millis(config.shutdown_grace_ms),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Serve until the peer closes the stream.
    ///
    /// Returns `Ok` on end of stream and `Err` only for transport faults.
    pub async fn run<R, W>(
        &mut self,
        mut reader: MessageReader<R>,
        writer: MessageWriter<W>,
    ) -> Result<(), McpError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        info!(server = %self.server_info.name, "MCP session starting");

        let (outbox, inbox) = mpsc::unbounded_channel();
        let writer_task = tokio::spawn(Self::write_loop(writer, inbox));
        let mut calls = JoinSet::new();

        let outcome = loop {
            tokio::select! {
                frame = reader.receive() => match frame {
                    Ok(Some(line)) => self.handle_frame(&line, &outbox, &mut calls),
                    Ok(None) => {
                        info!("Client closed connection");
                        break Ok(());
                    }
                    Err(e) if !e.is_fatal() => {
                        warn!("Discarding undecodable frame: {}", e);
                        let _ = outbox.send(JsonRpcResponse::failure(None, JsonRpcError::parse_error(&e)));
                    }
                    Err(e) => {
                        error!("Transport failure: {}", e);
                        break Err(e);
                    }
                },
                Some(joined) = calls.join_next(), if !calls.is_empty() => {
                    if let Err(e) = joined {
                        error!("Tool call task failed: {}", e);
                    }
                }
            }

            if outbox.is_closed() {
                error!("Writer stopped; ending session");
                break Err(McpError::WriterClosed);
            }
        };

        self.state = SessionState::Closed;
        self.finish_calls(&mut calls).await;
        drop(outbox);

        let written = match writer_task.await {
            Ok(result) => result,
            Err(e) => Err(McpError::Codec(format!("writer task failed: {}", e))),
        };

        info!("MCP session closed");
        match outcome {
            // The writer's own error is more specific than `WriterClosed`.
            Err(McpError::WriterClosed) => written.and(Err(McpError::WriterClosed)),
            Err(e) => Err(e),
            Ok(()) => written,
        }
    }

    /// Give in-flight calls the grace period, then abandon the rest.
    async fn finish_calls(&self, calls: &mut JoinSet<()>) {
        if calls.is_empty() {
            return;
        }

        debug!(pending = calls.len(), "Waiting for in-flight tool calls");
        let drained = tokio::time::timeout(self.shutdown_grace, async {
            while calls.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            warn!(pending = calls.len(), "Abandoning in-flight tool calls");
            calls.shutdown().await;
        }
    }

    async fn write_loop<W>(
        mut writer: MessageWriter<W>,
        mut inbox: mpsc::UnboundedReceiver<JsonRpcResponse>,
    ) -> Result<(), McpError>
    where
        W: AsyncWrite + Unpin,
    {
        while let Some(response) = inbox.recv().await {
            let message = encode_response(&response, response.id.as_ref())?;
            writer.send(&message).await?;
            debug!(id = ?response.id, "Sent response");
        }
        Ok(())
    }

    fn handle_frame(&mut self, line: &str, outbox: &Outbox, calls: &mut JoinSet<()>) {
        debug!("Received message: {}", line);

        let raw: Value = match serde_json::from_str(line) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Failed to parse message: {}", e);
                let _ = outbox.send(JsonRpcResponse::failure(None, JsonRpcError::parse_error(e)));
                return;
            }
        };

        let Some(object) = raw.as_object() else {
            let reason = if raw.is_array() {
                "batch requests are not supported"
            } else {
                "expected a JSON object"
            };
            let _ = outbox.send(JsonRpcResponse::failure(None, JsonRpcError::invalid_request(reason)));
            return;
        };

        let recovered_id = object
            .get("id")
            .and_then(|id| serde_json::from_value::<RequestId>(id.clone()).ok());

        // A present but null id cannot be answered in kind.
        if matches!(object.get("id"), Some(Value::Null)) {
            let _ = outbox.send(JsonRpcResponse::failure(
                None,
                JsonRpcError::invalid_request("request id must not be null"),
            ));
            return;
        }

        // Replies to requests we never sent.
        if !object.contains_key("method")
            && (object.contains_key("result") || object.contains_key("error"))
        {
            debug!("Ignoring response message from client");
            return;
        }

        let message: JsonRpcMessage = match serde_json::from_value(raw) {
            Ok(message) => message,
            Err(e) => {
                let _ = outbox.send(JsonRpcResponse::failure(
                    recovered_id,
                    JsonRpcError::invalid_request(e),
                ));
                return;
            }
        };

        let JsonRpcMessage {
            jsonrpc,
            id,
            method,
            params,
        } = message;

        if jsonrpc != JSONRPC_VERSION {
            if let Some(id) = id {
                let _ = outbox.send(JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_request(format!(
                        "unsupported jsonrpc version '{}'",
                        jsonrpc
                    )),
                ));
            }
            return;
        }

        match id {
            None => self.handle_notification(&method),
            Some(id) => {
                if let Some(response) = self.handle_request(id, &method, params, outbox, calls) {
                    let _ = outbox.send(response);
                }
            }
        }
    }

    fn handle_notification(&mut self, method: &str) {
        match method {
            "notifications/initialized" => {
                if self.state == SessionState::Handshaking {
                    self.state = SessionState::Ready;
                    info!("Client confirmed initialization; session ready");
                } else {
                    debug!(state = ?self.state, "Unexpected initialized notification");
                }
            }
            "notifications/cancelled" => {
                debug!("Client cancelled a request; it will still be answered");
            }
            other => debug!(method = %other, "Ignoring notification"),
        }
    }

    /// Handle a request. Returns the response to send now, or `None` when
    /// the request was handed off to a task that answers it later.
    fn handle_request(
        &mut self,
        id: RequestId,
        method: &str,
        params: Option<Value>,
        outbox: &Outbox,
        calls: &mut JoinSet<()>,
    ) -> Option<JsonRpcResponse> {
        let initialized = matches!(
            self.state,
            SessionState::Handshaking | SessionState::Ready
        );
        if !initialized && matches!(method, "tools/list" | "tools/call") {
            return Some(JsonRpcResponse::failure(Some(id), JsonRpcError::not_initialized()));
        }

        match method {
            "initialize" => Some(self.handle_initialize(id, params)),
            "ping" => Some(JsonRpcResponse::success(id, Value::Object(Map::new()))),
            "tools/list" => Some(self.handle_list_tools(id)),
            "tools/call" => match Self::parse_call(id.clone(), params) {
                Ok(request) => {
                    self.spawn_call(request, outbox.clone(), calls);
                    None
                }
                Err(error) => Some(JsonRpcResponse::failure(Some(id), error)),
            },
            other => {
                warn!(method = %other, "Unknown method");
                Some(JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::method_not_found(other),
                ))
            }
        }
    }

    fn handle_initialize(&mut self, id: RequestId, params: Option<Value>) -> JsonRpcResponse {
        if self.state != SessionState::Uninitialized {
            return JsonRpcResponse::failure(
                Some(id),
                JsonRpcError::invalid_request("session is already initialized"),
            );
        }

        let params: InitializeParams = match serde_json::from_value(params.unwrap_or(Value::Null))
        {
            Ok(params) => params,
            Err(e) => {
                return JsonRpcResponse::failure(
                    Some(id),
                    JsonRpcError::invalid_params(format!("initialize: {}", e)),
                );
            }
        };

        let version = negotiate_version(&params.protocol_version);
        if version != params.protocol_version {
            warn!(
                requested = %params.protocol_version,
                offered = %version,
                "Client requested an unsupported protocol version"
            );
        }

        if let Some(client) = &params.client_info {
            info!(client = %client.name, version = ?client.version, "Client connected");
        }

        self.state = SessionState::Handshaking;

        let result = InitializeResult {
            protocol_version: version.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: self.server_info.clone(),
            instructions: self.instructions.clone(),
        };

        JsonRpcResponse::from_result(id, &result)
    }

    fn handle_list_tools(&self, id: RequestId) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: self.dispatcher.registry().list(),
        };
        debug!(count = result.tools.len(), "Listing tools");
        JsonRpcResponse::from_result(id, &result)
    }

    fn parse_call(id: RequestId, params: Option<Value>) -> Result<InvocationRequest, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params.unwrap_or(Value::Null))
            .map_err(|e| JsonRpcError::invalid_params(format!("tools/call: {}", e)))?;

        let arguments = match params.arguments {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => {
                return Err(JsonRpcError::invalid_params(
                    "tools/call: arguments must be an object",
                ));
            }
        };

        Ok(InvocationRequest {
            id,
            name: params.name,
            arguments,
        })
    }

    fn spawn_call(&self, request: InvocationRequest, outbox: Outbox, calls: &mut JoinSet<()>) {
        let dispatcher = Arc::clone(&self.dispatcher);
        let slots = Arc::clone(&self.call_slots);

        calls.spawn(async move {
            // Acquire only fails on a closed semaphore; answer regardless.
            let _permit = slots.acquire_owned().await.ok();

            let id = request.id.clone();
            let result = dispatcher.dispatch(request).await;
            if outbox.send(JsonRpcResponse::from_result(id, &result)).is_err() {
                debug!("Session closed before the tool call finished");
            }
        });
    }
}

/// Serialize a response for the wire. One that cannot be serialized is
/// replaced by an internal error carrying the same id.
fn encode_response<T: Serialize>(response: &T, id: Option<&RequestId>) -> Result<String, McpError> {
    match serde_json::to_string(response) {
        Ok(message) => Ok(message),
        Err(e) => {
            error!(id = ?id, "Failed to serialize response: {}", e);
            let fallback = JsonRpcResponse::failure(
                id.cloned(),
                JsonRpcError::new(INTERNAL_ERROR, format!("Failed to serialize response: {}", e)),
            );
            Ok(serde_json::to_string(&fallback)?)
        }
    }
}
