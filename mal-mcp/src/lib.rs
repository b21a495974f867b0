//! # mal-mcp
//!
//! MyAnimeList catalog exposed as Model Context Protocol tools.
//!
//! Public endpoints (search, details, rankings, seasons, user lists) are
//! called with the application's client ID. Endpoints acting for the
//! signed-in user get a bearer token from [`mal_mcp_auth::TokenManager`],
//! which runs the browser authorization the first time one is needed.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod tools;

use std::sync::Arc;

use mal_mcp_auth::{NoBrowser, TokenManager};
use mal_mcp_server::McpServer;

pub use api::CatalogClient;
pub use config::Settings;
pub use endpoints::{Access, Endpoint, ENDPOINTS};
pub use error::{ToolError, ToolErrorKind};
pub use tools::{register_tools, EndpointTool};

/// Name reported to MCP clients.
pub const SERVER_NAME: &str = "myanimelist";

const INSTRUCTIONS: &str = "Tools for the MyAnimeList catalog. Tools that act on the \
signed-in user's account ask the user to authorize in a browser the first time they are \
called; use auth_status to check beforehand.";

/// Build the MCP server with every catalog tool registered.
pub fn build_server(settings: Settings) -> Result<McpServer, ToolError> {
    let client = CatalogClient::new(&settings, Arc::new(token_manager(&settings)))?;

    let server = McpServer::new(SERVER_NAME, env!("CARGO_PKG_VERSION")).with_instructions(INSTRUCTIONS);
    Ok(register_tools(server, Arc::new(client)))
}

fn token_manager(settings: &Settings) -> TokenManager {
    // Token endpoint calls share the catalog request timeout.
    let oauth = settings
        .oauth
        .clone()
        .with_token_timeout(settings.http_timeout);
    let tokens = TokenManager::new(oauth);
    if settings.no_browser {
        tokens.with_browser(Arc::new(NoBrowser))
    } else {
        tokens
    }
}
