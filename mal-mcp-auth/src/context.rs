//! PKCE context for a single authorization round-trip.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use crate::config::ChallengeMethod;
use crate::error::{AuthError, AuthResult};

const VERIFIER_BYTES: usize = 64;
const STATE_BYTES: usize = 16;

/// Runtime state for an in-progress OAuth PKCE flow.
///
/// Created fresh for every attempt and dropped once the code has been
/// exchanged or the attempt failed.
#[derive(Clone)]
pub struct PkceContext {
    /// Random state parameter for CSRF protection
    pub state: String,
    /// PKCE code verifier
    pub code_verifier: String,
    /// PKCE code challenge derived from the verifier
    pub code_challenge: String,
    /// How the challenge was derived
    pub method: ChallengeMethod,
}

impl PkceContext {
    /// Create a new context with a fresh verifier and an independent state.
    pub fn generate(method: ChallengeMethod) -> AuthResult<Self> {
        let code_verifier = random_urlsafe(VERIFIER_BYTES)?;
        let state = random_urlsafe(STATE_BYTES)?;
        let code_challenge = compute_code_challenge(&code_verifier, method);

        Ok(Self {
            state,
            code_verifier,
            code_challenge,
            method,
        })
    }
}

impl std::fmt::Debug for PkceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceContext")
            .field("state", &self.state)
            .field("code_verifier", &"<redacted>")
            .field("method", &self.method)
            .finish()
    }
}

/// Compute the PKCE code challenge for a verifier.
pub fn compute_code_challenge(verifier: &str, method: ChallengeMethod) -> String {
    match method {
        ChallengeMethod::S256 => URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes())),
        ChallengeMethod::Plain => verifier.to_string(),
    }
}

fn random_urlsafe(bytes: usize) -> AuthResult<String> {
    let mut buf = vec![0u8; bytes];
    getrandom::getrandom(&mut buf).map_err(AuthError::Entropy)?;
    Ok(URL_SAFE_NO_PAD.encode(buf))
}
