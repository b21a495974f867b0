//! OAuth configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};

/// MyAnimeList authorization endpoint.
pub const MAL_AUTHORIZE_URL: &str = "https://myanimelist.net/v1/oauth2/authorize";
/// MyAnimeList token endpoint.
pub const MAL_TOKEN_URL: &str = "https://myanimelist.net/v1/oauth2/token";
/// Port registered with the provider for the redirect URI.
pub const DEFAULT_CALLBACK_PORT: u16 = 8080;
/// Upper bound on a single token endpoint round-trip.
pub const DEFAULT_TOKEN_TIMEOUT: Duration = Duration::from_secs(30);

/// PKCE code challenge method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChallengeMethod {
    /// `BASE64URL(SHA256(verifier))`.
    #[default]
    S256,
    /// Challenge equals the verifier. Only for providers that reject `S256`.
    Plain,
}

impl ChallengeMethod {
    /// Wire name used in the `code_challenge_method` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::S256 => "S256",
            Self::Plain => "plain",
        }
    }
}

impl FromStr for ChallengeMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s256" => Ok(Self::S256),
            "plain" => Ok(Self::Plain),
            other => Err(AuthError::Config(format!(
                "unknown PKCE challenge method '{other}' (expected 'plain' or 'S256')"
            ))),
        }
    }
}

/// Configuration for an OAuth provider.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    /// OAuth client ID
    pub client_id: String,
    /// OAuth client secret, sent only to the token endpoint
    pub client_secret: Option<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
    /// Redirect URI host (e.g., "http://localhost")
    pub redirect_host: String,
    /// Redirect URI path (e.g., "callback")
    pub redirect_path: String,
    /// Fixed callback port, must match the registered redirect URI
    pub callback_port: u16,
    /// Interface the callback listener binds
    pub bind_ip: IpAddr,
    /// Callback timeout in seconds
    pub callback_timeout_secs: u64,
    /// PKCE challenge method
    pub challenge_method: ChallengeMethod,
    /// Seconds before expiry at which a token stops being served
    pub expiry_margin_secs: i64,
    /// Timeout for each token endpoint request
    pub token_timeout: Duration,
}

impl OAuthConfig {
    /// Create a new OAuth configuration.
    pub fn new(
        client_id: impl Into<String>,
        auth_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
            auth_url: auth_url.into(),
            token_url: token_url.into(),
            redirect_host: "http://localhost".to_string(),
            redirect_path: "callback".to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            bind_ip: IpAddr::V4(Ipv4Addr::LOCALHOST),
            callback_timeout_secs: 300,
            challenge_method: ChallengeMethod::S256,
            expiry_margin_secs: 60,
            token_timeout: DEFAULT_TOKEN_TIMEOUT,
        }
    }

    /// MyAnimeList preset.
    ///
    /// MyAnimeList only accepts the `plain` challenge method, so the preset
    /// selects it; the authorization builder logs a warning each time.
    pub fn myanimelist(client_id: impl Into<String>) -> Self {
        Self::new(client_id, MAL_AUTHORIZE_URL, MAL_TOKEN_URL)
            .with_challenge_method(ChallengeMethod::Plain)
    }

    /// Build the MyAnimeList preset from environment variables.
    ///
    /// Reads `MAL_CLIENT_ID` (required), `MAL_CLIENT_SECRET`,
    /// `MAL_OAUTH_CALLBACK_PORT`, `MAL_OAUTH_TIMEOUT_SECS` and
    /// `MAL_OAUTH_PKCE_METHOD`.
    pub fn from_env() -> AuthResult<Self> {
        let client_id = std::env::var("MAL_CLIENT_ID")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| AuthError::Config("MAL_CLIENT_ID is not set".to_string()))?;

        let mut config = Self::myanimelist(client_id.trim());

        if let Some(secret) = env_non_empty("MAL_CLIENT_SECRET") {
            config = config.with_client_secret(secret);
        }
        if let Some(port) = env_non_empty("MAL_OAUTH_CALLBACK_PORT") {
            let port = port
                .parse()
                .map_err(|_| AuthError::Config(format!("invalid MAL_OAUTH_CALLBACK_PORT: {port}")))?;
            config = config.with_callback_port(port);
        }
        if let Some(secs) = env_non_empty("MAL_OAUTH_TIMEOUT_SECS") {
            let secs = secs
                .parse()
                .map_err(|_| AuthError::Config(format!("invalid MAL_OAUTH_TIMEOUT_SECS: {secs}")))?;
            config = config.with_timeout(secs);
        }
        if let Some(method) = env_non_empty("MAL_OAUTH_PKCE_METHOD") {
            config = config.with_challenge_method(method.parse()?);
        }

        Ok(config)
    }

    /// Set the client secret.
    #[must_use]
    pub fn with_client_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(secret.into());
        self
    }

    /// Set the callback port.
    #[must_use]
    pub fn with_callback_port(mut self, port: u16) -> Self {
        self.callback_port = port;
        self
    }

    /// Set callback timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.callback_timeout_secs = timeout_secs;
        self
    }

    /// Set redirect path.
    #[must_use]
    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }

    /// Set the PKCE challenge method.
    #[must_use]
    pub fn with_challenge_method(mut self, method: ChallengeMethod) -> Self {
        self.challenge_method = method;
        self
    }

    /// Set the expiry safety margin.
    #[must_use]
    pub fn with_expiry_margin(mut self, secs: i64) -> Self {
        self.expiry_margin_secs = secs;
        self
    }

    /// Set the token endpoint request timeout.
    #[must_use]
    pub fn with_token_timeout(mut self, timeout: Duration) -> Self {
        self.token_timeout = timeout;
        self
    }

    /// Redirect URI sent in both the authorization URL and the code exchange.
    pub fn redirect_uri(&self) -> String {
        let host = self.redirect_host.trim_end_matches('/');
        let path = self.redirect_path.trim_start_matches('/');
        format!("{}:{}/{}", host, self.callback_port, path)
    }

    /// Socket address the callback listener binds.
    pub fn callback_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.callback_port)
    }

    /// Callback wait as a [`Duration`].
    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
