//! # mal-mcp-server
//!
//! Minimal Model Context Protocol server: newline-delimited JSON-RPC over
//! stdio exposing a set of tools.
//!
//! ## Example
//!
//! ```ignore
//! use mal_mcp_server::{CallToolResult, McpServer, McpTool};
//! use std::sync::Arc;
//!
//! let server = McpServer::new("my-server", "1.0.0").tool_fn(
//!     McpTool::new("echo", serde_json::json!({"type": "object"})),
//!     |args| CallToolResult::text(args.to_string()),
//! );
//!
//! Arc::new(server).run_stdio().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod server;
pub mod types;

pub use error::{McpError, McpResult};
pub use server::{FnToolHandler, McpServer, ToolHandler};
pub use types::*;
