//! Errors surfaced by catalog tools.
//!
//! Nothing propagates past a tool invocation: every failure is rendered as
//! an `isError` result whose text is a small JSON payload.

use mal_mcp_auth::AuthError;
use mal_mcp_server::CallToolResult;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;

/// Longest response body excerpt kept in an HTTP error message.
const MAX_BODY_EXCERPT: usize = 512;

/// Broad category of a tool failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolErrorKind {
    /// Arguments did not match the tool's schema.
    InvalidArguments,
    /// No bearer token could be obtained.
    Auth,
    /// The API answered with a non-success status.
    Http,
    /// The request never completed.
    Transport,
    /// The response body was not JSON.
    Decode,
    /// Startup or configuration problem.
    Config,
}

impl ToolErrorKind {
    /// Stable name used in the error payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArguments => "invalid_arguments",
            Self::Auth => "auth",
            Self::Http => "http",
            Self::Transport => "transport",
            Self::Decode => "decode",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed tool invocation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ToolError {
    /// Failure category.
    pub kind: ToolErrorKind,
    /// Human-readable description.
    pub message: String,
    /// HTTP status involved, if any.
    pub status: Option<u16>,
}

impl ToolError {
    /// Create an error without a status.
    pub fn new(kind: ToolErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    /// Arguments rejected before any request was made.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::new(ToolErrorKind::InvalidArguments, message)
    }

    /// Non-success API response.
    pub fn http(status: u16, body: &str) -> Self {
        let body = body.trim();
        let message = if body.is_empty() {
            format!("MyAnimeList API returned HTTP {status}")
        } else {
            let excerpt: String = body.chars().take(MAX_BODY_EXCERPT).collect();
            format!("MyAnimeList API returned HTTP {status}: {excerpt}")
        };
        Self {
            kind: ToolErrorKind::Http,
            message,
            status: Some(status),
        }
    }

    /// JSON payload reported to the client.
    pub fn to_payload(&self) -> JsonValue {
        let mut payload = json!({
            "error": self.message,
            "kind": self.kind.as_str(),
        });
        if let Some(status) = self.status {
            payload["status_code"] = json!(status);
        }
        payload
    }

    /// Render as an `isError` tool result.
    pub fn into_tool_result(self) -> CallToolResult {
        CallToolResult::error(self.to_payload().to_string())
    }
}

impl From<AuthError> for ToolError {
    fn from(err: AuthError) -> Self {
        Self {
            kind: ToolErrorKind::Auth,
            status: err.status(),
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ToolError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_decode() {
            ToolErrorKind::Decode
        } else {
            ToolErrorKind::Transport
        };
        Self {
            kind,
            status: err.status().map(|s| s.as_u16()),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ToolError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(
            ToolErrorKind::Decode,
            format!("response is not valid JSON: {err}"),
        )
    }
}
