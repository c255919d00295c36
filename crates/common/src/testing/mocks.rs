//! Mock implementations of the auth and storage traits
//!
//! In-memory doubles with failure injection, so tests never touch the
//! platform keychain or the network.

// Test doubles: errors are the injected ones
#![allow(clippy::missing_errors_doc)]

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{OAuthClientError, OAuthClientTrait, PkceChallenge, TokenSet, UserProfile};
use crate::security::{KeychainError, SecretStore};

#[derive(Debug, Default)]
struct SecretState {
    entries: HashMap<String, String>,
    fail_reads: bool,
    fail_writes: bool,
    fail_deletes: bool,
    failing_write_keys: HashSet<String>,
    failing_delete_keys: HashSet<String>,
}

/// In-memory [`SecretStore`] with failure injection
///
/// ```
/// use authkeep_common::testing::MockSecretStore;
///
/// let secrets = MockSecretStore::new();
/// secrets.insert("access_token", "a1");
/// secrets.fail_writes_for("expires_at");
/// assert_eq!(secrets.value("access_token").as_deref(), Some("a1"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSecretStore {
    state: Arc<Mutex<SecretState>>,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value, bypassing failure injection
    #[must_use]
    pub fn value(&self, key: &str) -> Option<String> {
        self.state.lock().entries.get(key).cloned()
    }

    /// Seed a value, bypassing failure injection
    pub fn insert(&self, key: &str, value: &str) {
        self.state.lock().entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&self, key: &str) {
        self.state.lock().entries.remove(key);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.state.lock().fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.state.lock().fail_deletes = fail;
    }

    /// Fail writes to one key only
    pub fn fail_writes_for(&self, key: &str) {
        self.state.lock().failing_write_keys.insert(key.to_string());
    }

    /// Fail deletes of one key only
    pub fn fail_deletes_for(&self, key: &str) {
        self.state.lock().failing_delete_keys.insert(key.to_string());
    }

    /// Clear every injected failure
    pub fn heal(&self) {
        let mut state = self.state.lock();
        state.fail_reads = false;
        state.fail_writes = false;
        state.fail_deletes = false;
        state.failing_write_keys.clear();
        state.failing_delete_keys.clear();
    }
}

#[async_trait]
impl SecretStore for MockSecretStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let mut state = self.state.lock();
        if state.fail_writes || state.failing_write_keys.contains(key) {
            return Err(KeychainError::AccessFailed(format!("injected write failure for {key}")));
        }
        state.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError> {
        let state = self.state.lock();
        if state.fail_reads {
            return Err(KeychainError::AccessFailed(format!("injected read failure for {key}")));
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), KeychainError> {
        let mut state = self.state.lock();
        if state.fail_deletes || state.failing_delete_keys.contains(key) {
            return Err(KeychainError::AccessFailed(format!("injected delete failure for {key}")));
        }
        state.entries.remove(key);
        Ok(())
    }
}

#[derive(Debug)]
struct OAuthState {
    exchange: Result<TokenSet, OAuthClientError>,
    refresh: Result<TokenSet, OAuthClientError>,
    user_info: Result<UserProfile, OAuthClientError>,
    delay: Option<Duration>,
    exchange_calls: Vec<(String, String)>,
    refresh_calls: Vec<String>,
    user_info_calls: Vec<String>,
    last_challenge: Option<(String, String)>,
}

impl Default for OAuthState {
    fn default() -> Self {
        Self {
            exchange: Ok(TokenSet::new(
                "mock_access_token",
                Some("mock_refresh_token".to_string()),
                Some("mock_id_token".to_string()),
                3600,
                "Bearer",
            )),
            refresh: Ok(TokenSet::new(
                "refreshed_access_token",
                Some("refreshed_refresh_token".to_string()),
                None,
                3600,
                "Bearer",
            )),
            user_info: Ok(MockOAuthClient::default_profile()),
            delay: None,
            exchange_calls: Vec::new(),
            refresh_calls: Vec::new(),
            user_info_calls: Vec::new(),
            last_challenge: None,
        }
    }
}

/// OAuth client double that records calls and returns scripted results
///
/// Follows the real client's contract: an empty refresh token fails with
/// `NoRefreshToken`, and a refresh response without a refresh token carries
/// the caller's forward.
#[derive(Debug, Clone, Default)]
pub struct MockOAuthClient {
    state: Arc<Mutex<OAuthState>>,
}

impl MockOAuthClient {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn default_profile() -> UserProfile {
        UserProfile {
            id: "user-123".to_string(),
            email: "user@example.com".to_string(),
            first_name: Some("Test".to_string()),
            last_name: Some("User".to_string()),
            profile_picture_url: None,
            organization_id: None,
        }
    }

    pub fn set_exchange_response(&self, tokens: TokenSet) {
        self.state.lock().exchange = Ok(tokens);
    }

    pub fn set_exchange_error(&self, error: OAuthClientError) {
        self.state.lock().exchange = Err(error);
    }

    pub fn set_refresh_response(&self, tokens: TokenSet) {
        self.state.lock().refresh = Ok(tokens);
    }

    pub fn set_refresh_error(&self, error: OAuthClientError) {
        self.state.lock().refresh = Err(error);
    }

    pub fn set_user_info(&self, profile: UserProfile) {
        self.state.lock().user_info = Ok(profile);
    }

    pub fn set_user_info_error(&self, error: OAuthClientError) {
        self.state.lock().user_info = Err(error);
    }

    /// Delay every network-like call, to widen race windows in tests
    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().delay = Some(delay);
    }

    /// `(code, code_verifier)` pairs passed to the exchange
    #[must_use]
    pub fn exchange_calls(&self) -> Vec<(String, String)> {
        self.state.lock().exchange_calls.clone()
    }

    #[must_use]
    pub fn refresh_calls(&self) -> Vec<String> {
        self.state.lock().refresh_calls.clone()
    }

    #[must_use]
    pub fn refresh_call_count(&self) -> usize {
        self.state.lock().refresh_calls.len()
    }

    /// Access tokens passed to the userinfo fetch
    #[must_use]
    pub fn user_info_calls(&self) -> Vec<String> {
        self.state.lock().user_info_calls.clone()
    }

    /// `(state, code_challenge)` of the last authorization URL built
    #[must_use]
    pub fn last_challenge(&self) -> Option<(String, String)> {
        self.state.lock().last_challenge.clone()
    }

    async fn pause(&self) {
        let delay = self.state.lock().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl OAuthClientTrait for MockOAuthClient {
    fn authorization_url(&self, challenge: &PkceChallenge) -> String {
        self.state.lock().last_challenge =
            Some((challenge.state.clone(), challenge.code_challenge.clone()));
        format!(
            "https://auth.mock/authorize?response_type=code&state={}&code_challenge={}&code_challenge_method={}",
            challenge.state,
            challenge.code_challenge,
            challenge.challenge_method()
        )
    }

    async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.state.lock().exchange_calls.push((code.to_string(), code_verifier.to_string()));
        self.pause().await;
        self.state.lock().exchange.clone()
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }
        self.state.lock().refresh_calls.push(refresh_token.to_string());
        self.pause().await;

        let mut tokens = self.state.lock().refresh.clone()?;
        if tokens.refresh_token.is_none() {
            tokens.refresh_token = Some(refresh_token.to_string());
        }
        Ok(tokens)
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, OAuthClientError> {
        self.state.lock().user_info_calls.push(access_token.to_string());
        self.pause().await;
        self.state.lock().user_info.clone()
    }
}
