//! Server settings read from the environment.

use std::time::Duration;

use mal_mcp_auth::OAuthConfig;

use crate::error::{ToolError, ToolErrorKind};

/// MyAnimeList REST API base URL.
pub const DEFAULT_API_URL: &str = "https://api.myanimelist.net/v2";
/// Default per-request timeout for catalog calls.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Runtime settings for the catalog server.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Catalog API base URL, without a trailing slash.
    pub api_url: String,
    /// Timeout applied to each catalog request.
    pub http_timeout: Duration,
    /// Log the authorization URL instead of launching a browser.
    pub no_browser: bool,
    /// OAuth settings for privileged calls. Its client ID is also sent as
    /// `X-MAL-CLIENT-ID` on public calls.
    pub oauth: OAuthConfig,
}

impl Settings {
    /// Settings with MyAnimeList defaults.
    pub fn new(oauth: OAuthConfig) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            no_browser: false,
            oauth,
        }
    }

    /// Read settings from `MAL_*` environment variables.
    pub fn from_env() -> Result<Self, ToolError> {
        let oauth = OAuthConfig::from_env()
            .map_err(|e| ToolError::new(ToolErrorKind::Config, e.to_string()))?;
        let mut settings = Self::new(oauth);

        if let Some(url) = env_non_empty("MAL_API_URL") {
            settings = settings.with_api_url(url);
        }
        if let Some(secs) = env_non_empty("MAL_HTTP_TIMEOUT_SECS") {
            let secs: u64 = secs.parse().map_err(|_| {
                ToolError::new(
                    ToolErrorKind::Config,
                    format!("invalid MAL_HTTP_TIMEOUT_SECS: {secs}"),
                )
            })?;
            settings = settings.with_http_timeout(Duration::from_secs(secs));
        }
        if let Some(flag) = env_non_empty("MAL_OAUTH_NO_BROWSER") {
            settings = settings.with_no_browser(parse_flag(&flag));
        }

        Ok(settings)
    }

    /// Override the API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the request timeout.
    #[must_use]
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Disable or enable launching a browser.
    #[must_use]
    pub fn with_no_browser(mut self, no_browser: bool) -> Self {
        self.no_browser = no_browser;
        self
    }

    /// Client ID sent on public calls.
    pub fn client_id(&self) -> &str {
        &self.oauth.client_id
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
