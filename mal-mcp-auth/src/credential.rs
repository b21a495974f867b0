//! Cached credential and its injectable store.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;

use crate::token::TokenResponse;

const MAX_LIFETIME_SECS: i64 = i32::MAX as i64;

/// A bearer credential with an absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Bearer token.
    pub access_token: String,
    /// Token used to renew `access_token` without user interaction.
    pub refresh_token: Option<String>,
    /// When `access_token` stops being accepted.
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Build a credential from a token response received at `now`.
    pub fn from_response(response: TokenResponse, now: DateTime<Utc>) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: now + Duration::seconds(response.expires_in.clamp(0, MAX_LIFETIME_SECS)),
        }
    }

    /// Build a refreshed credential, keeping the previous refresh token when
    /// the provider does not rotate it.
    pub fn refreshed(
        response: TokenResponse,
        previous_refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut credential = Self::from_response(response, now);
        if credential.refresh_token.is_none() {
            credential.refresh_token = Some(previous_refresh_token.to_string());
        }
        credential
    }

    /// Whether the access token may still be served at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at
            .checked_sub_signed(margin)
            .is_some_and(|deadline| now < deadline)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Shared holder of the current [`Credential`].
///
/// Cloning yields another handle to the same slot. Values are only ever
/// replaced whole.
#[derive(Debug, Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with a credential.
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Some(credential))),
        }
    }

    /// Snapshot of the current credential.
    pub fn get(&self) -> Option<Credential> {
        self.inner.read().clone()
    }

    /// Access token if one is valid at `now`.
    pub fn valid_access_token(&self, now: DateTime<Utc>, margin: Duration) -> Option<String> {
        self.inner
            .read()
            .as_ref()
            .filter(|c| c.is_valid_at(now, margin))
            .map(|c| c.access_token.clone())
    }

    /// Current refresh token, if any.
    pub fn refresh_token(&self) -> Option<String> {
        self.inner
            .read()
            .as_ref()
            .and_then(|c| c.refresh_token.clone())
    }

    /// Replace the credential.
    pub fn replace(&self, credential: Credential) {
        *self.inner.write() = Some(credential);
    }

    /// Force the access token to be treated as expired; the refresh token
    /// is kept.
    pub fn expire_access_token(&self) {
        if let Some(credential) = self.inner.write().as_mut() {
            credential.expires_at = DateTime::<Utc>::MIN_UTC;
        }
    }

    /// Expire the access token only if it is still `access_token`.
    ///
    /// Returns whether the stored credential was expired.
    pub fn expire_access_token_if(&self, access_token: &str) -> bool {
        match self.inner.write().as_mut() {
            Some(credential) if credential.access_token == access_token => {
                credential.expires_at = DateTime::<Utc>::MIN_UTC;
                true
            }
            _ => false,
        }
    }

    /// Drop the credential.
    pub fn clear(&self) {
        *self.inner.write() = None;
    }
}
