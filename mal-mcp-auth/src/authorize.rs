//! Authorization URL construction.

use url::Url;

use crate::config::{ChallengeMethod, OAuthConfig};
use crate::context::PkceContext;
use crate::error::AuthResult;

/// A ready-to-open authorization URL together with the PKCE context it
/// commits to.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// URL the user opens in a browser.
    pub url: String,
    /// Verifier and state bound to `url`.
    pub context: PkceContext,
}

impl AuthorizationRequest {
    /// Generate a fresh PKCE context and build the URL for it.
    pub fn new(config: &OAuthConfig) -> AuthResult<Self> {
        let context = PkceContext::generate(config.challenge_method)?;
        let url = build_authorization_url(config, &context)?;
        Ok(Self { url, context })
    }
}

/// Build the authorization URL with PKCE parameters.
pub fn build_authorization_url(config: &OAuthConfig, context: &PkceContext) -> AuthResult<String> {
    if context.method == ChallengeMethod::Plain {
        tracing::warn!(
            target: "mal_mcp_auth",
            "PKCE challenge method 'plain' sends the verifier in the authorization URL; \
             prefer S256 when the provider supports it"
        );
    }

    let redirect_uri = config.redirect_uri();
    let params = [
        ("response_type", "code"),
        ("client_id", config.client_id.as_str()),
        ("code_challenge", context.code_challenge.as_str()),
        ("code_challenge_method", context.method.as_str()),
        ("redirect_uri", redirect_uri.as_str()),
        ("state", context.state.as_str()),
    ];

    let url = Url::parse_with_params(&config.auth_url, &params)?;
    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[test]
    fn test_authorization_url_parameters() {
        let config = OAuthConfig::myanimelist("my-client");
        let request = AuthorizationRequest::new(&config).unwrap();

        assert!(request
            .url
            .starts_with("https://myanimelist.net/v1/oauth2/authorize?"));

        let q = query(&request.url);
        assert_eq!(q["response_type"], "code");
        assert_eq!(q["client_id"], "my-client");
        assert_eq!(q["redirect_uri"], "http://localhost:8080/callback");
        assert_eq!(q["state"], request.context.state);
        assert_eq!(q["code_challenge_method"], "plain");
        assert_eq!(q["code_challenge"], request.context.code_verifier);
    }

    #[test]
    fn test_s256_url_does_not_leak_verifier() {
        let config = OAuthConfig::new("id", "https://auth.example/authorize", "https://auth.example/token");
        let request = AuthorizationRequest::new(&config).unwrap();

        let q = query(&request.url);
        assert_eq!(q["code_challenge_method"], "S256");
        assert_ne!(q["code_challenge"], request.context.code_verifier);
        assert!(!request.url.contains(&request.context.code_verifier));
    }

    #[test]
    fn test_client_secret_not_in_url() {
        let config = OAuthConfig::myanimelist("id").with_client_secret("hunter2");
        let request = AuthorizationRequest::new(&config).unwrap();
        assert!(!request.url.contains("hunter2"));
    }

    #[test]
    fn test_invalid_auth_url() {
        let config = OAuthConfig::new("id", "not a url", "https://auth.example/token");
        assert!(AuthorizationRequest::new(&config).is_err());
    }
}
