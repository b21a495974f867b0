//! MCP tools backed by the endpoint table.

use std::sync::Arc;

use async_trait::async_trait;
use mal_mcp_auth::{AuthState, TokenManager};
use mal_mcp_server::{CallToolResult, McpResult, McpServer, McpTool, ToolHandler};
use serde_json::{json, Value as JsonValue};

use crate::api::CatalogClient;
use crate::endpoints::{Endpoint, ENDPOINTS};

/// A catalog endpoint exposed as a tool.
pub struct EndpointTool {
    endpoint: &'static Endpoint,
    client: Arc<CatalogClient>,
}

impl EndpointTool {
    /// Create a tool for `endpoint`.
    pub fn new(endpoint: &'static Endpoint, client: Arc<CatalogClient>) -> Self {
        Self { endpoint, client }
    }
}

#[async_trait]
impl ToolHandler for EndpointTool {
    fn definition(&self) -> McpTool {
        self.endpoint.definition()
    }

    async fn call(&self, arguments: JsonValue) -> McpResult<CallToolResult> {
        match self.client.execute(self.endpoint, &arguments).await {
            Ok(value) => Ok(CallToolResult::json(&value)),
            Err(e) => {
                tracing::warn!(
                    tool = self.endpoint.name,
                    kind = %e.kind,
                    status = ?e.status,
                    "tool call failed: {}",
                    e.message
                );
                Ok(e.into_tool_result())
            }
        }
    }
}

/// Describe the cached credential without starting an authorization.
pub fn auth_status(tokens: &TokenManager) -> JsonValue {
    match tokens.state() {
        AuthState::Unauthenticated => json!({"state": "unauthenticated"}),
        AuthState::Valid { expires_at } => json!({
            "state": "valid",
            "expires_at": expires_at.to_rfc3339(),
        }),
        AuthState::Expiring {
            expires_at,
            can_refresh,
        } => json!({
            "state": "expiring",
            "expires_at": expires_at.to_rfc3339(),
            "can_refresh": can_refresh,
        }),
    }
}

/// Register one tool per catalog endpoint plus `auth_status`.
pub fn register_tools(server: McpServer, client: Arc<CatalogClient>) -> McpServer {
    for endpoint in ENDPOINTS {
        server.register(Arc::new(EndpointTool::new(endpoint, Arc::clone(&client))));
    }

    let tokens = Arc::clone(client.tokens());
    server.tool_fn(
        McpTool::new(
            "auth_status",
            json!({"type": "object", "properties": {}, "additionalProperties": false}),
        )
        .with_description(
            "Report whether a MyAnimeList authorization is cached. Never opens a browser.",
        ),
        move |_| CallToolResult::json(&auth_status(&tokens)),
    )
}
