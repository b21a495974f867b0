//! Token endpoint client: authorization-code exchange and refresh.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::OAuthConfig;
use crate::error::{AuthError, AuthResult};

/// Token response from the OAuth token endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Refresh token, when the provider issues or rotates one.
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of `access_token` in seconds.
    pub expires_in: i64,
    /// Usually `Bearer`.
    #[serde(default)]
    pub token_type: Option<String>,
}

impl std::fmt::Debug for TokenResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenResponse")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// The two grants the lifecycle manager needs from a token endpoint.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Exchange an authorization code (plus PKCE verifier) for tokens.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<TokenResponse>;

    /// Exchange a refresh token for a new token pair.
    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse>;
}

/// Form-encoded token endpoint client.
#[derive(Debug, Clone)]
pub struct TokenClient {
    client: Client,
    config: OAuthConfig,
}

#[derive(Clone, Copy)]
enum Grant {
    AuthorizationCode,
    RefreshToken,
}

impl TokenClient {
    /// Create a client with a default reqwest client.
    pub fn new(config: OAuthConfig) -> Self {
        Self::with_client(Client::new(), config)
    }

    /// Create with a custom reqwest client.
    pub fn with_client(client: Client, config: OAuthConfig) -> Self {
        Self { client, config }
    }

    async fn post(&self, grant: Grant, params: &[(&str, &str)]) -> AuthResult<TokenResponse> {
        let mut form: Vec<(&str, &str)> = vec![("client_id", self.config.client_id.as_str())];
        if let Some(secret) = self.config.client_secret.as_deref() {
            form.push(("client_secret", secret));
        }
        form.extend_from_slice(params);

        let response = self
            .client
            .post(&self.config.token_url)
            .header("Accept", "application/json")
            .timeout(self.config.token_timeout)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(target: "mal_mcp_auth", %status, "token endpoint rejected request");
            return Err(match grant {
                Grant::AuthorizationCode => AuthError::TokenExchange {
                    status: status.as_u16(),
                    body,
                },
                Grant::RefreshToken => AuthError::TokenRefresh {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl TokenEndpoint for TokenClient {
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> AuthResult<TokenResponse> {
        let redirect_uri = self.config.redirect_uri();
        self.post(
            Grant::AuthorizationCode,
            &[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", &redirect_uri),
                ("code_verifier", code_verifier),
            ],
        )
        .await
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
        self.post(
            Grant::RefreshToken,
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }
}
