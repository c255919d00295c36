//! PKCE (Proof Key for Code Exchange) for OAuth 2.0
//!
//! Implements RFC 7636 with the `S256` method. Each login attempt gets a fresh
//! [`PkceChallenge`]; it lives only for one authorization round-trip and its
//! secrets are zeroed when it is dropped.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of random bytes behind a verifier or state token (43 characters
/// once encoded).
const RANDOM_BYTES: usize = 32;

/// The only challenge method this client sends
pub const CHALLENGE_METHOD: &str = "S256";

#[derive(Debug, Error)]
pub enum PkceError {
    /// The operating system random source could not be read. Not retriable.
    #[error("secure random source unavailable: {0}")]
    RandomSourceUnavailable(String),
}

fn random_url_safe_token() -> Result<String, PkceError> {
    let mut bytes = [0u8; RANDOM_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| PkceError::RandomSourceUnavailable(e.to_string()))?;
    let token = URL_SAFE_NO_PAD.encode(bytes);
    bytes.zeroize();
    Ok(token)
}

/// Generate a code verifier from 32 bytes of OS randomness
///
/// The result is base64url without padding, 43 characters long, which is
/// inside RFC 7636's 43-128 character range.
///
/// # Errors
/// Returns [`PkceError::RandomSourceUnavailable`] if the OS random source
/// fails.
pub fn generate_code_verifier() -> Result<String, PkceError> {
    random_url_safe_token()
}

/// `BASE64URL(SHA256(ASCII(verifier)))`
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(digest)
}

/// Generate a random `state` token for CSRF protection
///
/// # Errors
/// Returns [`PkceError::RandomSourceUnavailable`] if the OS random source
/// fails.
pub fn generate_state() -> Result<String, PkceError> {
    random_url_safe_token()
}

/// Compare the `state` sent with the authorization request against the one
/// received on the redirect.
///
/// Runs in time independent of where the inputs differ.
#[must_use]
pub fn validate_state(expected: &str, actual: &str) -> bool {
    let expected = expected.as_bytes();
    let actual = actual.as_bytes();
    if expected.len() != actual.len() || expected.is_empty() {
        return false;
    }
    expected.iter().zip(actual).fold(0u8, |acc, (a, b)| acc | (a ^ b)) == 0
}

/// Verifier, challenge and CSRF state for one authorization round-trip
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PkceChallenge {
    /// Sent only with the token exchange
    pub code_verifier: String,
    /// Sent with the authorization request
    pub code_challenge: String,
    /// Must come back unchanged on the redirect
    pub state: String,
}

impl PkceChallenge {
    /// # Errors
    /// Returns [`PkceError`] if the OS random source fails.
    ///
    /// ```
    /// use authkeep_common::auth::pkce::PkceChallenge;
    ///
    /// let pkce = PkceChallenge::generate().unwrap();
    /// assert_eq!(pkce.code_verifier.len(), 43);
    /// assert_eq!(pkce.challenge_method(), "S256");
    /// ```
    pub fn generate() -> Result<Self, PkceError> {
        let code_verifier = generate_code_verifier()?;
        let code_challenge = generate_code_challenge(&code_verifier);
        let state = generate_state()?;

        Ok(Self { code_verifier, code_challenge, state })
    }

    #[must_use]
    pub const fn challenge_method(&self) -> &'static str {
        CHALLENGE_METHOD
    }
}

impl fmt::Debug for PkceChallenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PkceChallenge")
            .field("code_verifier", &"[redacted]")
            .field("code_challenge", &self.code_challenge)
            .field("state", &"[redacted]")
            .finish()
    }
}
