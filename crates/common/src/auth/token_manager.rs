//! Token manager
//!
//! Owns the refresh side of the token lifecycle:
//! - Refresh through the OAuth client, persisting the result immediately
//! - Single-flight: concurrent refresh requests share one HTTP call and its
//!   outcome
//! - Valid-token reads that refresh when the stored token is inside the
//!   expiry buffer
//!
//! Every session change (sign-in, sign-out) goes through
//! [`TokenManager::replace_session`] or [`TokenManager::clear_session`],
//! which bump a session epoch under the persist gate. A refresh only
//! persists if the epoch it started in is still current, so a refresh
//! racing a sign-out can never bring the old session back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::OAuthClientError;
use super::credential_store::CredentialStoreError;
use super::traits::{CredentialStoreTrait, OAuthClientTrait};
use super::types::TokenSet;

#[derive(Debug, Clone, Error)]
pub enum TokenManagerError {
    #[error("OAuth error: {0}")]
    Client(#[from] OAuthClientError),

    #[error("Credential store error: {0}")]
    Store(#[from] CredentialStoreError),

    #[error("No refresh token available")]
    NoRefreshToken,

    /// The session changed while the refresh was running; its tokens were
    /// discarded
    #[error("Token refresh superseded by a session change")]
    Superseded,
}

type RefreshResult = Result<TokenSet, TokenManagerError>;
type SharedRefresh = Shared<BoxFuture<'static, RefreshResult>>;

/// A usable access token and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidToken {
    /// The stored token, valid beyond the buffer
    Current(String),
    /// A token obtained by refreshing just now (already persisted) in
    /// session `epoch`
    Refreshed { tokens: TokenSet, epoch: u64 },
}

impl ValidToken {
    #[must_use]
    pub fn access_token(&self) -> &str {
        match self {
            Self::Current(token) => token,
            Self::Refreshed { tokens, .. } => &tokens.access_token,
        }
    }

    #[must_use]
    pub fn into_access_token(self) -> String {
        match self {
            Self::Current(token) => token,
            Self::Refreshed { tokens, .. } => tokens.access_token,
        }
    }
}

struct InFlight {
    generation: u64,
    epoch: u64,
    refresh: SharedRefresh,
}

/// Refresh coordinator over an OAuth client and a credential store
pub struct TokenManager {
    oauth_client: Arc<dyn OAuthClientTrait>,
    store: Arc<dyn CredentialStoreTrait>,
    in_flight: Mutex<Option<InFlight>>,
    generation: AtomicU64,
    epoch: Arc<AtomicU64>,
    persist_gate: Arc<tokio::sync::Mutex<()>>,
}

impl TokenManager {
    pub fn new(oauth_client: Arc<dyn OAuthClientTrait>, store: Arc<dyn CredentialStoreTrait>) -> Self {
        Self {
            oauth_client,
            store,
            in_flight: Mutex::new(None),
            generation: AtomicU64::new(0),
            epoch: Arc::new(AtomicU64::new(0)),
            persist_gate: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStoreTrait> {
        &self.store
    }

    /// Current session epoch. Changes on every sign-in and sign-out.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Sign-out: clear the store and end the current session epoch.
    ///
    /// A refresh still in flight finishes with
    /// [`TokenManagerError::Superseded`] and persists nothing.
    ///
    /// # Errors
    /// The store's first delete failure. The epoch advances regardless.
    pub async fn clear_session(&self) -> Result<(), CredentialStoreError> {
        let _gate = self.persist_gate.lock().await;
        let result = self.store.clear_tokens().await;
        self.advance_epoch();
        result
    }

    /// Sign-in: replace whatever is stored with `tokens` and start a new
    /// session epoch.
    ///
    /// Stale optional entries from an earlier session are cleared first.
    ///
    /// # Errors
    /// [`CredentialStoreError::Write`] if the new tokens cannot be stored.
    pub async fn replace_session(&self, tokens: &TokenSet) -> Result<(), CredentialStoreError> {
        let _gate = self.persist_gate.lock().await;
        if let Err(err) = self.store.clear_tokens().await {
            warn!(error = %err, "Failed to clear previous credentials before storing new ones");
        }
        let result = self.store.store_tokens(tokens).await;
        self.advance_epoch();
        result
    }

    /// Caller holds the persist gate.
    fn advance_epoch(&self) {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(stale) = self.in_flight.lock().take() {
            debug!(generation = stale.generation, epoch, "Detached refresh from ended session");
        }
    }

    /// Refresh with `refresh_token` and persist the new token set.
    ///
    /// If a refresh is already running, this call waits for it and returns
    /// its outcome instead of issuing a second request.
    ///
    /// # Errors
    /// - [`TokenManagerError::Client`] if the refresh request fails
    /// - [`TokenManagerError::Store`] if the new tokens cannot be persisted
    /// - [`TokenManagerError::Superseded`] if the session changed meanwhile
    pub async fn refresh_access_token(&self, refresh_token: &str) -> RefreshResult {
        self.refresh_in_epoch(refresh_token).await.map(|(tokens, _)| tokens)
    }

    async fn refresh_in_epoch(
        &self,
        refresh_token: &str,
    ) -> Result<(TokenSet, u64), TokenManagerError> {
        let (generation, epoch, refresh) = self.join_or_start(refresh_token);
        let result = refresh.await;

        let mut slot = self.in_flight.lock();
        if slot.as_ref().is_some_and(|current| current.generation == generation) {
            *slot = None;
        }
        result.map(|tokens| (tokens, epoch))
    }

    fn join_or_start(&self, refresh_token: &str) -> (u64, u64, SharedRefresh) {
        let mut slot = self.in_flight.lock();
        if let Some(current) = slot.as_ref() {
            debug!(generation = current.generation, "Joining in-flight token refresh");
            return (current.generation, current.epoch, current.refresh.clone());
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let started_in = self.epoch.load(Ordering::SeqCst);
        let client = Arc::clone(&self.oauth_client);
        let store = Arc::clone(&self.store);
        let epoch = Arc::clone(&self.epoch);
        let gate = Arc::clone(&self.persist_gate);
        let refresh_token = zeroize::Zeroizing::new(refresh_token.to_string());

        let refresh = async move {
            let tokens = client.refresh_access_token(&refresh_token).await?;

            let _gate = gate.lock().await;
            if epoch.load(Ordering::SeqCst) != started_in {
                info!(generation, "Session changed during refresh, discarding refreshed tokens");
                return Err(TokenManagerError::Superseded);
            }
            store.store_tokens(&tokens).await?;
            info!(generation, expires_in = tokens.expires_in, "Access token refreshed and stored");
            Ok::<_, TokenManagerError>(tokens)
        }
        .boxed()
        .shared();

        *slot = Some(InFlight { generation, epoch: started_in, refresh: refresh.clone() });
        (generation, started_in, refresh)
    }

    /// Refresh using the refresh token currently in the store.
    ///
    /// # Errors
    /// [`TokenManagerError::NoRefreshToken`] when nothing (or no refresh
    /// token) is stored, otherwise as for
    /// [`refresh_access_token`](Self::refresh_access_token).
    pub async fn refresh_stored_tokens(&self) -> RefreshResult {
        let refresh_token = self
            .store
            .get_tokens()
            .await?
            .and_then(|tokens| tokens.refresh_token)
            .filter(|token| !token.is_empty())
            .ok_or(TokenManagerError::NoRefreshToken)?;

        self.refresh_access_token(&refresh_token).await
    }

    /// A token that stays valid for more than `buffer_seconds`.
    ///
    /// - stored and valid: returned as is
    /// - expired with a refresh token: refreshed (single-flight)
    /// - expired without a refresh token, or nothing stored: `None`
    ///
    /// The decision is taken from a single store read. A refresh cut short
    /// by a session change is not reported; the store is read again.
    ///
    /// # Errors
    /// Store read failures and refresh failures.
    pub async fn get_valid_token(
        &self,
        buffer_seconds: i64,
    ) -> Result<Option<ValidToken>, TokenManagerError> {
        loop {
            let Some(tokens) = self.store.get_tokens().await? else {
                return Ok(None);
            };

            if !tokens.expires_within(buffer_seconds) {
                return Ok(Some(ValidToken::Current(tokens.access_token)));
            }

            let Some(refresh_token) = tokens.refresh_token.filter(|token| !token.is_empty())
            else {
                warn!("Stored token expired and no refresh token is available");
                return Ok(None);
            };

            debug!(buffer_seconds, "Stored token inside expiry buffer, refreshing");
            match self.refresh_in_epoch(&refresh_token).await {
                Ok((tokens, epoch)) => return Ok(Some(ValidToken::Refreshed { tokens, epoch })),
                Err(TokenManagerError::Superseded) => {
                    debug!("Refresh superseded, re-reading stored tokens");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Access token string form of [`get_valid_token`](Self::get_valid_token).
    ///
    /// # Errors
    /// As for [`get_valid_token`](Self::get_valid_token).
    pub async fn get_valid_access_token(
        &self,
        buffer_seconds: i64,
    ) -> Result<Option<String>, TokenManagerError> {
        Ok(self.get_valid_token(buffer_seconds).await?.map(ValidToken::into_access_token))
    }
}
