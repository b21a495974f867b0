//! Token lifecycle: serve from cache, refresh, or run the interactive flow.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

use crate::authorize::AuthorizationRequest;
use crate::browser::{BrowserLauncher, SystemBrowser};
use crate::config::OAuthConfig;
use crate::credential::{Credential, CredentialStore};
use crate::error::{AuthError, AuthResult};
use crate::listener::{CallbackReceiver, LoopbackReceiver};
use crate::token::{TokenClient, TokenEndpoint};

/// Observable credential state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// No credential; the next acquire runs the interactive flow.
    Unauthenticated,
    /// The access token is served from cache.
    Valid {
        /// Expiry of the cached token.
        expires_at: DateTime<Utc>,
    },
    /// The access token is inside the safety margin or past expiry.
    Expiring {
        /// Expiry of the cached token.
        expires_at: DateTime<Utc>,
        /// Whether a refresh will be attempted before re-authorizing.
        can_refresh: bool,
    },
}

/// Owns the bearer credential and decides how to obtain a valid one.
///
/// Cache hits only take a short read lock. Refreshes and interactive
/// authorizations are single-flight: at most one round-trip holds the
/// callback port, and every caller that queued behind it gets its outcome,
/// success or failure. Only callers arriving after it finished start a new
/// one.
pub struct TokenManager {
    config: OAuthConfig,
    store: CredentialStore,
    endpoint: Arc<dyn TokenEndpoint>,
    receiver: Arc<dyn CallbackReceiver>,
    browser: Arc<dyn BrowserLauncher>,
    /// Guards renewal; holds the failure of the last finished attempt.
    authorize_lock: Mutex<Option<AuthError>>,
    /// Finished renewal attempts. Only written with `authorize_lock` held.
    attempts: AtomicU64,
}

impl TokenManager {
    /// Create a manager with the production token client, loopback
    /// listener and system browser.
    pub fn new(config: OAuthConfig) -> Self {
        let endpoint = Arc::new(TokenClient::new(config.clone()));
        let receiver = Arc::new(LoopbackReceiver::new(
            config.callback_addr(),
            config.callback_timeout(),
        ));

        Self {
            config,
            store: CredentialStore::new(),
            endpoint,
            receiver,
            browser: Arc::new(SystemBrowser),
            authorize_lock: Mutex::new(None),
            attempts: AtomicU64::new(0),
        }
    }

    /// Use an existing credential store.
    #[must_use]
    pub fn with_store(mut self, store: CredentialStore) -> Self {
        self.store = store;
        self
    }

    /// Use a custom token endpoint.
    #[must_use]
    pub fn with_token_endpoint(mut self, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        self.endpoint = endpoint;
        self
    }

    /// Use a custom callback receiver.
    #[must_use]
    pub fn with_callback_receiver(mut self, receiver: Arc<dyn CallbackReceiver>) -> Self {
        self.receiver = receiver;
        self
    }

    /// Use a custom browser launcher.
    #[must_use]
    pub fn with_browser(mut self, browser: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = browser;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    /// The underlying credential store.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Current state of the cached credential.
    pub fn state(&self) -> AuthState {
        match self.store.get() {
            None => AuthState::Unauthenticated,
            Some(c) if c.is_valid_at(Utc::now(), self.margin()) => AuthState::Valid {
                expires_at: c.expires_at,
            },
            Some(c) => AuthState::Expiring {
                expires_at: c.expires_at,
                can_refresh: c.refresh_token.is_some(),
            },
        }
    }

    /// Return a valid access token, refreshing or re-authorizing as needed.
    pub async fn acquire_token(&self) -> AuthResult<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let seen = self.attempts.load(Ordering::Acquire);
        let mut last_failure = self.authorize_lock.lock().await;

        // Whoever held the lock before us may have renewed the credential.
        if let Some(token) = self.cached_token() {
            tracing::debug!(target: "mal_mcp_auth", "using credential obtained by a concurrent caller");
            return Ok(token);
        }

        // An attempt finished while we were queued behind it; its failure is ours.
        if self.attempts.load(Ordering::Acquire) != seen {
            if let Some(err) = last_failure.as_ref() {
                tracing::debug!(target: "mal_mcp_auth", error = %err, "reporting failure of the attempt in flight");
                return Err(err.clone());
            }
        }

        let result = self.renew().await;
        *last_failure = result.as_ref().err().cloned();
        self.attempts.fetch_add(1, Ordering::Release);
        result
    }

    async fn renew(&self) -> AuthResult<String> {
        if let Some(refresh_token) = self.store.refresh_token() {
            match self.refresh(&refresh_token).await {
                Ok(token) => return Ok(token),
                Err(e) => tracing::warn!(
                    target: "mal_mcp_auth",
                    error = %e,
                    "could not refresh the access token, starting a new authorization"
                ),
            }
        }

        self.authorize_interactively().await
    }

    /// Stop serving the cached access token but keep the refresh token, so
    /// the next acquire refreshes.
    pub fn invalidate(&self) {
        self.store.expire_access_token();
    }

    /// Invalidate after the API rejected `rejected`. No-op when the cached
    /// token has already been replaced by a newer one.
    pub fn invalidate_token(&self, rejected: &str) -> bool {
        let expired = self.store.expire_access_token_if(rejected);
        if !expired {
            tracing::debug!(target: "mal_mcp_auth", "rejected token was already replaced");
        }
        expired
    }

    /// Forget the credential entirely.
    pub fn sign_out(&self) {
        self.store.clear();
    }

    fn margin(&self) -> Duration {
        Duration::seconds(self.config.expiry_margin_secs)
    }

    fn cached_token(&self) -> Option<String> {
        self.store.valid_access_token(Utc::now(), self.margin())
    }

    async fn refresh(&self, refresh_token: &str) -> AuthResult<String> {
        tracing::debug!(target: "mal_mcp_auth", "refreshing access token");
        let response = self.endpoint.refresh(refresh_token).await?;
        let credential = Credential::refreshed(response, refresh_token, Utc::now());
        let token = credential.access_token.clone();
        tracing::info!(target: "mal_mcp_auth", expires_at = %credential.expires_at, "access token refreshed");
        self.store.replace(credential);
        Ok(token)
    }

    async fn authorize_interactively(&self) -> AuthResult<String> {
        let request = AuthorizationRequest::new(&self.config)?;

        // Arm the listener before anyone can be redirected to it.
        let pending = self.receiver.listen().await?;

        tracing::info!(
            target: "mal_mcp_auth",
            "Open this URL in your browser to authorize: {}",
            request.url
        );
        if let Err(e) = self.browser.open(&request.url) {
            tracing::warn!(
                target: "mal_mcp_auth",
                error = %e,
                "could not open a browser, open the URL above manually"
            );
        }

        let callback = pending.wait().await?;

        if callback.state.as_deref() != Some(request.context.state.as_str()) {
            tracing::warn!(target: "mal_mcp_auth", "authorization callback carried an unexpected state");
            return Err(AuthError::StateMismatch {
                expected: request.context.state,
                actual: callback.state,
            });
        }

        let response = self
            .endpoint
            .exchange_code(&callback.code, &request.context.code_verifier)
            .await?;
        let credential = Credential::from_response(response, Utc::now());
        let token = credential.access_token.clone();
        tracing::info!(target: "mal_mcp_auth", expires_at = %credential.expires_at, "authorization complete");
        self.store.replace(credential);
        Ok(token)
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listener::{CallbackResult, PendingCallback};
    use crate::token::TokenResponse;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use url::Url;

    type ExchangeFn = dyn Fn(&str, &str) -> AuthResult<TokenResponse> + Send + Sync;
    type RefreshFn = dyn Fn(&str) -> AuthResult<TokenResponse> + Send + Sync;

    fn tokens(access: &str, refresh: Option<&str>, expires_in: i64) -> TokenResponse {
        TokenResponse {
            access_token: access.to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_in,
            token_type: Some("Bearer".to_string()),
        }
    }

    struct FakeEndpoint {
        exchange: Box<ExchangeFn>,
        refresh: Box<RefreshFn>,
        exchanges: parking_lot::Mutex<Vec<(String, String)>>,
        refreshes: AtomicUsize,
    }

    impl FakeEndpoint {
        fn new(
            exchange: impl Fn(&str, &str) -> AuthResult<TokenResponse> + Send + Sync + 'static,
            refresh: impl Fn(&str) -> AuthResult<TokenResponse> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                exchange: Box::new(exchange),
                refresh: Box::new(refresh),
                exchanges: parking_lot::Mutex::new(Vec::new()),
                refreshes: AtomicUsize::new(0),
            })
        }

        fn exchange_count(&self) -> usize {
            self.exchanges.lock().len()
        }
    }

    #[async_trait]
    impl TokenEndpoint for FakeEndpoint {
        async fn exchange_code(&self, code: &str, verifier: &str) -> AuthResult<TokenResponse> {
            self.exchanges
                .lock()
                .push((code.to_string(), verifier.to_string()));
            (self.exchange)(code, verifier)
        }

        async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenResponse> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            (self.refresh)(refresh_token)
        }
    }

    /// Records opened URLs; the fake receiver answers with their `state`.
    #[derive(Default)]
    struct FakeBrowser {
        opened: parking_lot::Mutex<Vec<String>>,
    }

    impl FakeBrowser {
        fn last_state(&self) -> Option<String> {
            let opened = self.opened.lock();
            let url = Url::parse(opened.last()?).ok()?;
            let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
            query.get("state").cloned()
        }
    }

    impl BrowserLauncher for FakeBrowser {
        fn open(&self, url: &str) -> std::io::Result<()> {
            self.opened.lock().push(url.to_string());
            Ok(())
        }
    }

    enum Reply {
        EchoState,
        State(Option<String>),
        Timeout,
    }

    /// Behaves like a single loopback port: a second `listen` while armed
    /// fails with a bind error.
    struct FakeReceiver {
        browser: Arc<FakeBrowser>,
        reply: Reply,
        armed: Arc<AtomicBool>,
        binds: AtomicUsize,
    }

    impl FakeReceiver {
        fn new(browser: Arc<FakeBrowser>, reply: Reply) -> Arc<Self> {
            Arc::new(Self {
                browser,
                reply,
                armed: Arc::new(AtomicBool::new(false)),
                binds: AtomicUsize::new(0),
            })
        }

        fn bind_count(&self) -> usize {
            self.binds.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CallbackReceiver for FakeReceiver {
        async fn listen(&self) -> AuthResult<Box<dyn PendingCallback>> {
            let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
            if self.armed.swap(true, Ordering::SeqCst) {
                return Err(AuthError::Bind {
                    addr,
                    source: Arc::new(std::io::Error::from(std::io::ErrorKind::AddrInUse)),
                });
            }
            self.binds.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakePending {
                browser: self.browser.clone(),
                result: match &self.reply {
                    Reply::EchoState => None,
                    Reply::State(s) => Some(Ok(s.clone())),
                    Reply::Timeout => Some(Err(())),
                },
                armed: self.armed.clone(),
            }))
        }
    }

    struct FakePending {
        browser: Arc<FakeBrowser>,
        result: Option<Result<Option<String>, ()>>,
        armed: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PendingCallback for FakePending {
        async fn wait(self: Box<Self>) -> AuthResult<CallbackResult> {
            // Give concurrent callers a chance to pile up.
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            let FakePending {
                browser,
                result,
                armed,
            } = *self;
            armed.store(false, Ordering::SeqCst);
            let state = match result {
                None => browser.last_state(),
                Some(Ok(state)) => state,
                Some(Err(())) => {
                    return Err(AuthError::Timeout(std::time::Duration::from_millis(20)))
                }
            };
            Ok(CallbackResult {
                code: "abc".to_string(),
                state,
            })
        }
    }

    struct Harness {
        manager: Arc<TokenManager>,
        endpoint: Arc<FakeEndpoint>,
        receiver: Arc<FakeReceiver>,
        browser: Arc<FakeBrowser>,
    }

    fn harness(store: CredentialStore, endpoint: Arc<FakeEndpoint>, reply: Reply) -> Harness {
        let browser = Arc::new(FakeBrowser::default());
        let receiver = FakeReceiver::new(browser.clone(), reply);
        let manager = TokenManager::new(OAuthConfig::myanimelist("client"))
            .with_store(store)
            .with_token_endpoint(endpoint.clone())
            .with_callback_receiver(receiver.clone())
            .with_browser(browser.clone());

        Harness {
            manager: Arc::new(manager),
            endpoint,
            receiver,
            browser,
        }
    }

    fn issuing_endpoint() -> Arc<FakeEndpoint> {
        FakeEndpoint::new(
            |_, _| Ok(tokens("T1", Some("R1"), 3600)),
            |_| Ok(tokens("T2", Some("R2"), 3600)),
        )
    }

    fn credential(access: &str, refresh: Option<&str>, expires_in: i64) -> Credential {
        Credential::from_response(tokens(access, refresh, expires_in), Utc::now())
    }

    #[tokio::test]
    async fn test_valid_credential_is_served_without_io() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 3600));
        let h = harness(store, issuing_endpoint(), Reply::EchoState);

        assert_eq!(h.manager.acquire_token().await.unwrap(), "T0");
        assert_eq!(h.endpoint.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(h.endpoint.exchange_count(), 0);
        assert_eq!(h.receiver.bind_count(), 0);
        assert!(matches!(h.manager.state(), AuthState::Valid { .. }));
    }

    #[tokio::test]
    async fn test_expiring_credential_is_refreshed() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 30));
        let endpoint = FakeEndpoint::new(
            |_, _| panic!("no exchange expected"),
            |rt| {
                assert_eq!(rt, "R0");
                Ok(tokens("T2", None, 3600))
            },
        );
        let h = harness(store, endpoint, Reply::EchoState);
        assert!(matches!(
            h.manager.state(),
            AuthState::Expiring { can_refresh: true, .. }
        ));

        let before = Utc::now();
        let token = h.manager.acquire_token().await.unwrap();
        let after = Utc::now();

        assert_eq!(token, "T2");
        assert_eq!(h.receiver.bind_count(), 0);

        let stored = h.manager.store().get().unwrap();
        assert_eq!(stored.access_token, "T2");
        assert_eq!(stored.refresh_token.as_deref(), Some("R0"));
        assert!(stored.expires_at >= before + Duration::seconds(3600));
        assert!(stored.expires_at <= after + Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_authorization() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 10));
        let endpoint = FakeEndpoint::new(
            |_, _| Ok(tokens("T1", Some("R1"), 3600)),
            |_| {
                Err(AuthError::TokenRefresh {
                    status: 400,
                    body: r#"{"error":"invalid_grant"}"#.to_string(),
                })
            },
        );
        let h = harness(store, endpoint, Reply::EchoState);

        assert_eq!(h.manager.acquire_token().await.unwrap(), "T1");
        assert_eq!(h.endpoint.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(h.receiver.bind_count(), 1);
        assert_eq!(h.endpoint.exchange_count(), 1);
        assert_eq!(
            h.manager.store().refresh_token().as_deref(),
            Some("R1")
        );
    }

    #[tokio::test]
    async fn test_state_mismatch_stops_before_exchange() {
        let h = harness(
            CredentialStore::new(),
            issuing_endpoint(),
            Reply::State(Some("forged".to_string())),
        );

        let err = h.manager.acquire_token().await.unwrap_err();

        assert!(matches!(
            err,
            AuthError::StateMismatch { ref actual, .. } if actual.as_deref() == Some("forged")
        ));
        assert_eq!(h.endpoint.exchange_count(), 0);
        assert_eq!(h.manager.state(), AuthState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_missing_state_is_a_mismatch() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::State(None));

        let err = h.manager.acquire_token().await.unwrap_err();
        assert!(matches!(err, AuthError::StateMismatch { actual: None, .. }));
        assert_eq!(h.endpoint.exchange_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_share_one_round_trip() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::EchoState);

        let (a, b) = tokio::join!(h.manager.acquire_token(), h.manager.acquire_token());

        assert_eq!(a.unwrap(), "T1");
        assert_eq!(b.unwrap(), "T1");
        assert_eq!(h.receiver.bind_count(), 1);
        assert_eq!(h.endpoint.exchange_count(), 1);
        assert_eq!(h.browser.opened.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquires_across_tasks() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::EchoState);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let manager = h.manager.clone();
                tokio::spawn(async move { manager.acquire_token().await })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), "T1");
        }
        assert_eq!(h.receiver.bind_count(), 1);
        assert_eq!(h.endpoint.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_timeout() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::Timeout);

        let (a, b) = tokio::join!(h.manager.acquire_token(), h.manager.acquire_token());

        assert!(matches!(a, Err(AuthError::Timeout(_))));
        assert!(matches!(b, Err(AuthError::Timeout(_))));
        assert_eq!(h.receiver.bind_count(), 1);
        assert_eq!(h.browser.opened.lock().len(), 1);

        // A caller arriving after the failure starts a new round-trip.
        let _ = h.manager.acquire_token().await;
        assert_eq!(h.receiver.bind_count(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_a_state_mismatch() {
        let h = harness(
            CredentialStore::new(),
            issuing_endpoint(),
            Reply::State(Some("forged".to_string())),
        );

        let (a, b, c) = tokio::join!(
            h.manager.acquire_token(),
            h.manager.acquire_token(),
            h.manager.acquire_token()
        );

        for result in [a, b, c] {
            assert!(matches!(
                result,
                Err(AuthError::StateMismatch { ref actual, .. }) if actual.as_deref() == Some("forged")
            ));
        }
        assert_eq!(h.receiver.bind_count(), 1);
        assert_eq!(h.browser.opened.lock().len(), 1);
        assert_eq!(h.endpoint.exchange_count(), 0);
    }

    #[tokio::test]
    async fn test_end_to_end_authorization_then_cache() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::EchoState);
        assert_eq!(h.manager.state(), AuthState::Unauthenticated);

        assert_eq!(h.manager.acquire_token().await.unwrap(), "T1");

        let state = h.browser.last_state().unwrap();
        let url = h.browser.opened.lock()[0].clone();
        assert!(url.contains(&format!("state={state}")));

        let exchanges = h.endpoint.exchanges.lock().clone();
        assert_eq!(exchanges.len(), 1);
        assert_eq!(exchanges[0].0, "abc");

        // Cached from here on.
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T1");
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T1");
        assert_eq!(h.endpoint.exchange_count(), 1);
        assert_eq!(h.endpoint.refreshes.load(Ordering::SeqCst), 0);
        assert_eq!(h.receiver.bind_count(), 1);
        assert!(matches!(h.manager.state(), AuthState::Valid { .. }));
    }

    #[tokio::test]
    async fn test_verifier_sent_matches_url_challenge() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::EchoState);
        h.manager.acquire_token().await.unwrap();

        let url = Url::parse(&h.browser.opened.lock()[0]).unwrap();
        let query: HashMap<_, _> = url.query_pairs().into_owned().collect();
        let verifier = h.endpoint.exchanges.lock()[0].1.clone();

        // The preset uses the plain method.
        assert_eq!(query["code_challenge"], verifier);
    }

    #[tokio::test]
    async fn test_timeout_leaves_state_untouched_and_is_retryable() {
        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::Timeout);

        let err = h.manager.acquire_token().await.unwrap_err();
        assert!(matches!(err, AuthError::Timeout(_)));
        assert!(err.is_recoverable());
        assert!(h.manager.store().get().is_none());

        // The port was released, so a retry binds again.
        let _ = h.manager.acquire_token().await;
        assert_eq!(h.receiver.bind_count(), 2);
    }

    #[tokio::test]
    async fn test_exchange_failure_is_surfaced() {
        let endpoint = FakeEndpoint::new(
            |_, _| {
                Err(AuthError::TokenExchange {
                    status: 400,
                    body: "code already used".to_string(),
                })
            },
            |_| panic!("no refresh expected"),
        );
        let h = harness(CredentialStore::new(), endpoint, Reply::EchoState);

        let err = h.manager.acquire_token().await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(h.manager.store().get().is_none());
    }

    #[tokio::test]
    async fn test_invalidate_forces_refresh() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 3600));
        let h = harness(store, issuing_endpoint(), Reply::EchoState);

        h.manager.invalidate();
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T2");
        assert_eq!(h.endpoint.refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(h.receiver.bind_count(), 0);
    }

    #[tokio::test]
    async fn test_invalidate_token_ignores_replaced_credential() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 3600));
        let h = harness(store, issuing_endpoint(), Reply::EchoState);

        assert!(!h.manager.invalidate_token("T-old"));
        assert!(matches!(h.manager.state(), AuthState::Valid { .. }));
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T0");

        assert!(h.manager.invalidate_token("T0"));
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T2");
    }

    #[tokio::test]
    async fn test_sign_out() {
        let store = CredentialStore::with_credential(credential("T0", Some("R0"), 3600));
        let h = harness(store, issuing_endpoint(), Reply::EchoState);

        h.manager.sign_out();
        assert_eq!(h.manager.state(), AuthState::Unauthenticated);
        assert_eq!(h.manager.acquire_token().await.unwrap(), "T1");
    }

    #[tokio::test]
    async fn test_browser_failure_is_not_fatal() {
        struct BrokenBrowser(Arc<FakeBrowser>);
        impl BrowserLauncher for BrokenBrowser {
            fn open(&self, url: &str) -> std::io::Result<()> {
                self.0.open(url)?;
                Err(std::io::Error::new(std::io::ErrorKind::NotFound, "no browser"))
            }
        }

        let h = harness(CredentialStore::new(), issuing_endpoint(), Reply::EchoState);
        let manager = TokenManager::new(OAuthConfig::myanimelist("client"))
            .with_token_endpoint(h.endpoint.clone())
            .with_callback_receiver(h.receiver.clone())
            .with_browser(Arc::new(BrokenBrowser(h.browser.clone())));

        assert_eq!(manager.acquire_token().await.unwrap(), "T1");
    }
}
