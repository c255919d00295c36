//! Traits for OAuth and credential storage operations
//!
//! These seams let the session layer depend on behaviour rather than on the
//! HTTP client or a particular secret backend, and let tests substitute
//! in-memory doubles.

use async_trait::async_trait;

use super::client::OAuthClientError;
use super::credential_store::CredentialStoreError;
use super::pkce::PkceChallenge;
use super::types::{TokenSet, UserProfile};

/// Operations against the authorization server
#[async_trait]
pub trait OAuthClientTrait: Send + Sync {
    /// Browser URL for one authorization attempt
    fn authorization_url(&self, challenge: &PkceChallenge) -> String;

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// Returns error if the request fails or the server rejects the code
    async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OAuthClientError>;

    /// Refresh the access token. A response without a new refresh token
    /// carries `refresh_token` forward.
    ///
    /// # Errors
    /// Returns error if the refresh token is empty, the request fails or the
    /// server rejects the token
    async fn refresh_access_token(&self, refresh_token: &str)
        -> Result<TokenSet, OAuthClientError>;

    /// Fetch the profile of the user owning `access_token`
    ///
    /// # Errors
    /// Returns error if the request fails or the server rejects the token
    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, OAuthClientError>;
}

/// Durable storage of the current token set
#[async_trait]
pub trait CredentialStoreTrait: Send + Sync {
    /// Persist `tokens`, stamping the absolute expiry from `expires_in`.
    /// Optional fields that are `None` are left untouched.
    ///
    /// # Errors
    /// [`CredentialStoreError::Write`] if any entry cannot be written; entries
    /// already written by this call are restored first.
    async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), CredentialStoreError>;

    /// Stored tokens with `expires_in` re-derived from the stored expiry.
    /// `Ok(None)` when the access token, expiry or token type is missing.
    ///
    /// # Errors
    /// [`CredentialStoreError::Read`] if the backend cannot be read
    async fn get_tokens(&self) -> Result<Option<TokenSet>, CredentialStoreError>;

    /// Whether the stored token expires within `buffer_seconds`. True when
    /// the expiry is missing or unreadable.
    async fn is_token_expired(&self, buffer_seconds: i64) -> bool;

    /// Remove every stored entry. Idempotent.
    ///
    /// # Errors
    /// The first [`CredentialStoreError::Delete`] encountered; every key is
    /// still attempted.
    async fn clear_tokens(&self) -> Result<(), CredentialStoreError>;

    /// The stored access token when it is valid beyond the default buffer.
    /// Never refreshes.
    async fn get_valid_access_token(&self) -> Option<String>;

    /// Seconds until the stored token expires (negative once expired).
    async fn seconds_until_expiry(&self) -> Option<i64>;
}
