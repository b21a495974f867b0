//! Authentication error types.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors raised while obtaining or renewing a bearer credential.
///
/// Cheap to clone: one failed round-trip is reported to every caller that
/// was waiting on it.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The callback listener could not bind its loopback address.
    #[error("Failed to bind callback listener on {addr}: {source}")]
    Bind {
        /// Address the listener tried to bind.
        addr: SocketAddr,
        /// Underlying socket error.
        #[source]
        source: Arc<std::io::Error>,
    },

    /// No redirect reached the callback listener in time.
    #[error("Timed out after {}s waiting for the authorization callback", .0.as_secs())]
    Timeout(Duration),

    /// The `state` returned by the provider differs from the one we sent.
    #[error("State mismatch: expected {expected}, received {}", .actual.as_deref().unwrap_or("<none>"))]
    StateMismatch {
        /// State generated for this round-trip.
        expected: String,
        /// State carried by the callback, if any.
        actual: Option<String>,
    },

    /// The callback request carried no authorization code.
    #[error("Authorization code not received")]
    MissingCode,

    /// The provider redirected back with an OAuth error instead of a code.
    #[error("Authorization denied: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    AuthorizationDenied {
        /// OAuth error code (e.g. `access_denied`).
        error: String,
        /// Optional human readable description.
        description: Option<String>,
    },

    /// The token endpoint rejected an authorization-code exchange.
    #[error("Token exchange failed: HTTP {status}: {body}")]
    TokenExchange {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The token endpoint rejected a refresh.
    #[error("Token refresh failed: HTTP {status}: {body}")]
    TokenRefresh {
        /// HTTP status returned by the token endpoint.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// Network or decoding failure talking to the token endpoint.
    #[error("HTTP error: {0}")]
    Transport(#[source] Arc<reqwest::Error>),

    /// The OS random source failed.
    #[error("Failed to generate random bytes: {0}")]
    Entropy(getrandom::Error),

    /// A configured endpoint is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// IO failure while serving the callback.
    #[error("IO error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Missing or malformed configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl AuthError {
    /// HTTP status associated with this error, when there is one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::TokenExchange { status, .. } | Self::TokenRefresh { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether calling `acquire_token` again may succeed without any change.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::Bind { .. } | Self::Transport(_) | Self::TokenRefresh { .. }
        )
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<std::io::Error> for AuthError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(Arc::new(err))
    }
}

/// Result type for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;
