//! MCP server implementation.
//!
//! Newline-delimited JSON-RPC over any async reader/writer pair, stdio in
//! production. Every request runs on its own task so a slow tool call (for
//! instance one waiting on a browser authorization) does not hold up the
//! others.

use crate::error::{McpError, McpResult};
use crate::types::{
    CallToolParams, CallToolResult, Implementation, InitializeResult, JsonRpcError,
    JsonRpcMessage, JsonRpcResponse, ListToolsResult, McpTool, RequestId, ServerCapabilities,
    ToolsCapability, PROTOCOL_VERSION,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

/// Trait for MCP tool handlers.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Get the tool definition.
    fn definition(&self) -> McpTool;

    /// Handle a tool call.
    async fn call(&self, arguments: JsonValue) -> McpResult<CallToolResult>;
}

/// Simple function-based tool handler.
pub struct FnToolHandler<F>
where
    F: Fn(JsonValue) -> CallToolResult + Send + Sync,
{
    definition: McpTool,
    handler: F,
}

impl<F> FnToolHandler<F>
where
    F: Fn(JsonValue) -> CallToolResult + Send + Sync,
{
    /// Create a new function tool handler.
    pub fn new(definition: McpTool, handler: F) -> Self {
        Self {
            definition,
            handler,
        }
    }
}

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(JsonValue) -> CallToolResult + Send + Sync,
{
    fn definition(&self) -> McpTool {
        self.definition.clone()
    }

    async fn call(&self, arguments: JsonValue) -> McpResult<CallToolResult> {
        Ok((self.handler)(arguments))
    }
}

/// MCP server for exposing tools.
///
/// # Example
///
/// ```ignore
/// use mal_mcp_server::{McpServer, McpTool, CallToolResult};
/// use std::sync::Arc;
///
/// let server = McpServer::new("my-server", "1.0.0")
///     .tool_fn(
///         McpTool::new("echo", serde_json::json!({"type": "object"}))
///             .with_description("Echo the input"),
///         |args| CallToolResult::text(args.to_string()),
///     );
///
/// Arc::new(server).run_stdio().await?;
/// ```
pub struct McpServer {
    info: Implementation,
    instructions: Option<String>,
    tools: RwLock<BTreeMap<String, Arc<dyn ToolHandler>>>,
    capabilities: ServerCapabilities,
}

impl McpServer {
    /// Create a new server.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            info: Implementation::new(name, version),
            instructions: None,
            tools: RwLock::new(BTreeMap::new()),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
        }
    }

    /// Set instructions sent to the client on initialize.
    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Add a tool handler.
    pub fn tool(self, handler: impl ToolHandler + 'static) -> Self {
        self.register(Arc::new(handler));
        self
    }

    /// Add a sync function tool.
    pub fn tool_fn<F>(self, definition: McpTool, handler: F) -> Self
    where
        F: Fn(JsonValue) -> CallToolResult + Send + Sync + 'static,
    {
        self.tool(FnToolHandler::new(definition, handler))
    }

    /// Register a shared tool handler.
    pub fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.definition().name;
        if self.tools.write().insert(name.clone(), handler).is_some() {
            tracing::warn!(tool = %name, "replacing previously registered tool");
        }
    }

    /// Run the server on stdio.
    pub async fn run_stdio(self: Arc<Self>) -> McpResult<()> {
        self.serve(tokio::io::stdin(), tokio::io::stdout()).await
    }

    /// Serve newline-delimited JSON-RPC until `reader` reaches EOF.
    ///
    /// Requests still running at EOF are allowed to finish and their
    /// responses are written before returning.
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, mut writer: W) -> McpResult<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();
        let mut reader = BufReader::new(reader);
        // Partial lines survive a cancelled read_until.
        let mut buf = Vec::new();
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                read = reader.read_until(b'\n', &mut buf) => {
                    if read? == 0 {
                        break;
                    }
                    let line = match String::from_utf8(std::mem::take(&mut buf)) {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!(error = %e, "discarding input line that is not UTF-8");
                            let _ = tx.send(JsonRpcResponse::error(
                                RequestId::Null,
                                JsonRpcError::PARSE_ERROR,
                                "Parse error: invalid UTF-8",
                            ));
                            continue;
                        }
                    };
                    let line = line.trim().to_string();
                    if line.is_empty() {
                        continue;
                    }
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    in_flight.spawn(async move {
                        if let Some(response) = server.handle_message(&line).await {
                            let _ = tx.send(response);
                        }
                    });
                }
                Some(response) = rx.recv() => {
                    write_response(&mut writer, &response).await?;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "request task failed");
                    }
                }
            }
        }

        drop(tx);
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "request task failed");
            }
        }
        while let Some(response) = rx.recv().await {
            write_response(&mut writer, &response).await?;
        }

        Ok(())
    }

    async fn handle_message(&self, message: &str) -> Option<JsonRpcResponse> {
        let message: JsonRpcMessage = match serde_json::from_str(message) {
            Ok(m) => m,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    RequestId::Null,
                    JsonRpcError::PARSE_ERROR,
                    format!("Parse error: {}", e),
                ));
            }
        };

        let request = match message {
            JsonRpcMessage::Notification(notification) => {
                tracing::debug!(method = %notification.method, "notification");
                return None;
            }
            JsonRpcMessage::Request(request) => request,
        };

        tracing::debug!(method = %request.method, "request");

        match request.method.as_str() {
            "initialize" => {
                let result = InitializeResult {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                    capabilities: self.capabilities.clone(),
                    server_info: self.info.clone(),
                    instructions: self.instructions.clone(),
                };
                Some(JsonRpcResponse::success(request.id, result))
            }
            "ping" => Some(JsonRpcResponse::success(request.id, serde_json::json!({}))),
            "tools/list" => {
                let tools: Vec<McpTool> =
                    self.tools.read().values().map(|h| h.definition()).collect();
                let result = ListToolsResult {
                    tools,
                    next_cursor: None,
                };
                Some(JsonRpcResponse::success(request.id, result))
            }
            "tools/call" => {
                let params: CallToolParams = match request.params {
                    Some(p) => match serde_json::from_value(p) {
                        Ok(params) => params,
                        Err(e) => {
                            return Some(JsonRpcResponse::error(
                                request.id,
                                JsonRpcError::INVALID_PARAMS,
                                format!("Invalid params: {}", e),
                            ));
                        }
                    },
                    None => {
                        return Some(JsonRpcResponse::error(
                            request.id,
                            JsonRpcError::INVALID_PARAMS,
                            "Missing params",
                        ));
                    }
                };

                let handler = self.tools.read().get(&params.name).cloned();
                let Some(handler) = handler else {
                    return Some(JsonRpcResponse::error(
                        request.id,
                        JsonRpcError::INVALID_PARAMS,
                        McpError::ToolNotFound(params.name).to_string(),
                    ));
                };

                let result = match handler.call(params.arguments).await {
                    Ok(output) => output,
                    Err(e) => CallToolResult::error(e.to_string()),
                };
                Some(JsonRpcResponse::success(request.id, result))
            }
            _ => Some(JsonRpcResponse::error(
                request.id,
                JsonRpcError::METHOD_NOT_FOUND,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    /// Get server info.
    pub fn info(&self) -> &Implementation {
        &self.info
    }

    /// Get registered tool count.
    pub fn tool_count(&self) -> usize {
        self.tools.read().len()
    }
}

async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &JsonRpcResponse,
) -> McpResult<()> {
    let json = serde_json::to_string(response)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
