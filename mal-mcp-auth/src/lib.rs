//! OAuth2 authorization-code + PKCE token lifecycle for mal-mcp.
//!
//! This crate owns the bearer credential used by privileged catalog tools:
//!
//! - [`OAuthConfig`]: provider endpoints, client credentials, callback port
//! - [`AuthorizationRequest`]: authorization URL bound to a fresh [`PkceContext`]
//! - [`CallbackListener`]: one-shot loopback listener for the redirect
//! - [`TokenClient`]: authorization-code exchange and refresh
//! - [`TokenManager`]: serves cached tokens, refreshes, or re-authorizes
//!
//! ## Example
//!
//! ```rust,ignore
//! use mal_mcp_auth::{OAuthConfig, TokenManager};
//!
//! let manager = TokenManager::new(OAuthConfig::from_env()?);
//! let token = manager.acquire_token().await?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod authorize;
pub mod browser;
pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod listener;
pub mod manager;
pub mod token;

pub use authorize::{build_authorization_url, AuthorizationRequest};
pub use browser::{BrowserLauncher, NoBrowser, SystemBrowser};
pub use config::{ChallengeMethod, OAuthConfig};
pub use context::PkceContext;
pub use credential::{Credential, CredentialStore};
pub use error::{AuthError, AuthResult};
pub use listener::{
    CallbackListener, CallbackReceiver, CallbackResult, LoopbackReceiver, PendingCallback,
};
pub use manager::{AuthState, TokenManager};
pub use token::{TokenClient, TokenEndpoint, TokenResponse};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use url::Url;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Plays the provider's part: follows the authorization URL straight to
    /// the redirect URI with a code and the state it was given.
    struct RedirectingBrowser {
        callback: SocketAddr,
    }

    impl BrowserLauncher for RedirectingBrowser {
        fn open(&self, url: &str) -> std::io::Result<()> {
            let url = Url::parse(url).map_err(std::io::Error::other)?;
            let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
            let target = format!(
                "/callback?code=abc&state={}",
                urlencoding::encode(&query["state"])
            );
            let addr = self.callback;

            tokio::spawn(async move {
                let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
                let request = format!("GET {target} HTTP/1.1\r\nHost: localhost\r\n\r\n");
                stream.write_all(request.as_bytes()).await.unwrap();
                let mut response = Vec::new();
                let _ = stream.read_to_end(&mut response).await;
            });
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_full_flow_over_loopback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .and(body_string_contains("code=abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer",
                "access_token": "T1",
                "refresh_token": "R1",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(&server)
            .await;

        // Find a free port for the callback.
        let reserved = CallbackListener::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let port = reserved.local_addr().port();
        drop(reserved);

        let config = OAuthConfig::new(
            "client-1",
            format!("{}/v1/oauth2/authorize", server.uri()),
            format!("{}/v1/oauth2/token", server.uri()),
        )
        .with_callback_port(port)
        .with_timeout(5);

        let browser = Arc::new(RedirectingBrowser {
            callback: config.callback_addr(),
        });
        let manager = TokenManager::new(config).with_browser(browser);

        assert_eq!(manager.acquire_token().await.unwrap(), "T1");
        // Served from cache; the mock's expect(1) verifies no second exchange.
        assert_eq!(manager.acquire_token().await.unwrap(), "T1");

        let credential = manager.store().get().unwrap();
        assert_eq!(credential.refresh_token.as_deref(), Some("R1"));
        assert!(credential.expires_at > chrono::Utc::now() + chrono::Duration::seconds(3500));
    }
}
