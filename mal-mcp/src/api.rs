//! HTTP client for the MyAnimeList catalog API.

use std::sync::Arc;

use mal_mcp_auth::TokenManager;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value as JsonValue};

use crate::config::Settings;
use crate::endpoints::{Access, Endpoint};
use crate::error::ToolError;

/// Header identifying the application on public calls.
const CLIENT_ID_HEADER: &str = "X-MAL-CLIENT-ID";

/// Executes catalog endpoints with the right credentials.
pub struct CatalogClient {
    http: Client,
    base_url: String,
    client_id: String,
    tokens: Arc<TokenManager>,
}

impl CatalogClient {
    /// Build a client sharing one connection pool for every tool.
    pub fn new(settings: &Settings, tokens: Arc<TokenManager>) -> Result<Self, ToolError> {
        let http = Client::builder()
            .timeout(settings.http_timeout)
            .user_agent(concat!("mal-mcp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(http, settings, tokens))
    }

    /// Build with an existing HTTP client.
    pub fn with_client(http: Client, settings: &Settings, tokens: Arc<TokenManager>) -> Self {
        Self {
            http,
            base_url: settings.api_url.trim_end_matches('/').to_string(),
            client_id: settings.client_id().to_string(),
            tokens,
        }
    }

    /// The token manager used for privileged calls.
    pub fn tokens(&self) -> &Arc<TokenManager> {
        &self.tokens
    }

    /// Call `endpoint` with `arguments` and return the decoded response.
    pub async fn execute(
        &self,
        endpoint: &Endpoint,
        arguments: &JsonValue,
    ) -> Result<JsonValue, ToolError> {
        let request = endpoint.prepare(arguments)?;
        let url = format!("{}{}", self.base_url, request.path);

        let mut builder = self
            .http
            .request(request.method.into(), &url)
            .query(&request.query);
        if !request.form.is_empty() {
            builder = builder.form(&request.form);
        }
        let bearer = match endpoint.access {
            Access::Public => {
                builder = builder.header(CLIENT_ID_HEADER, &self.client_id);
                None
            }
            Access::Privileged => {
                let token = self.tokens.acquire_token().await?;
                builder = builder.bearer_auth(&token);
                Some(token)
            }
        };

        tracing::debug!(tool = endpoint.name, path = %request.path, "calling catalog API");
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            if let Some(token) = bearer.as_deref() {
                tracing::warn!(
                    tool = endpoint.name,
                    "access token rejected, the next call will renew it"
                );
                self.tokens.invalidate_token(token);
            }
        }

        let body = response.text().await?;
        if !status.is_success() {
            return Err(ToolError::http(status.as_u16(), &body));
        }

        // List deletions answer with an empty body.
        if body.trim().is_empty() {
            return Ok(json!({"status": status.as_u16()}));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

impl std::fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}
