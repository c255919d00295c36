//! Secure credential store
//!
//! Persists the current [`TokenSet`] as five independent entries in a
//! [`SecretStore`]:
//!
//! | key             | value                                   |
//! |-----------------|-----------------------------------------|
//! | `access_token`  | access token                            |
//! | `refresh_token` | refresh token (optional)                |
//! | `id_token`      | ID token (optional)                     |
//! | `expires_at`    | absolute expiry, epoch milliseconds     |
//! | `token_type`    | token type                              |
//!
//! `expires_in` is never stored. It is computed into `expires_at` on write
//! and re-derived on read, so the value returned always reflects the
//! remaining lifetime.
//!
//! A read/write lock spans each operation, so a reader never observes a new
//! access token paired with an old expiry.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::traits::CredentialStoreTrait;
use super::types::TokenSet;
use crate::security::{KeychainError, SecretStore};
use crate::time::Clock;

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const ID_TOKEN_KEY: &str = "id_token";
pub const EXPIRES_AT_KEY: &str = "expires_at";
pub const TOKEN_TYPE_KEY: &str = "token_type";

/// Every key the store owns, in write order
pub const TOKEN_KEYS: [&str; 5] =
    [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, ID_TOKEN_KEY, EXPIRES_AT_KEY, TOKEN_TYPE_KEY];

/// Buffer used by [`CredentialStore::get_valid_access_token`]
pub const DEFAULT_EXPIRY_BUFFER_SECONDS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialStoreError {
    /// The secure store rejected a write (keystore locked or unavailable)
    #[error("Failed to store {key}: {message}")]
    Write { key: String, message: String },

    #[error("Failed to read {key}: {message}")]
    Read { key: String, message: String },

    #[error("Failed to delete {key}: {message}")]
    Delete { key: String, message: String },
}

impl CredentialStoreError {
    fn write(key: &str, err: &KeychainError) -> Self {
        Self::Write { key: key.to_string(), message: err.to_string() }
    }

    fn read(key: &str, err: &KeychainError) -> Self {
        Self::Read { key: key.to_string(), message: err.to_string() }
    }

    fn delete(key: &str, err: &KeychainError) -> Self {
        Self::Delete { key: key.to_string(), message: err.to_string() }
    }
}

/// Token persistence over a [`SecretStore`]
pub struct CredentialStore {
    secrets: Arc<dyn SecretStore>,
    clock: Arc<dyn Clock>,
    lock: RwLock<()>,
}

impl CredentialStore {
    pub fn new(secrets: Arc<dyn SecretStore>, clock: Arc<dyn Clock>) -> Self {
        Self { secrets, clock, lock: RwLock::new(()) }
    }

    /// See [`CredentialStoreTrait::store_tokens`].
    ///
    /// # Errors
    /// [`CredentialStoreError::Write`] on the first failed read-back or write.
    pub async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), CredentialStoreError> {
        let _guard = self.lock.write().await;

        let expires_at = self
            .clock
            .millis_since_epoch()
            .saturating_add(tokens.expires_in.saturating_mul(1000));

        let mut writes: Vec<(&str, String)> = vec![(ACCESS_TOKEN_KEY, tokens.access_token.clone())];
        if let Some(refresh_token) = &tokens.refresh_token {
            writes.push((REFRESH_TOKEN_KEY, refresh_token.clone()));
        }
        if let Some(id_token) = &tokens.id_token {
            writes.push((ID_TOKEN_KEY, id_token.clone()));
        }
        writes.push((EXPIRES_AT_KEY, expires_at.to_string()));
        writes.push((TOKEN_TYPE_KEY, tokens.token_type.clone()));

        let mut applied: Vec<(&str, Option<String>)> = Vec::with_capacity(writes.len());
        for (key, value) in &writes {
            let previous = match self.secrets.get(key).await {
                Ok(previous) => previous,
                Err(e) => {
                    self.rollback(&applied).await;
                    return Err(CredentialStoreError::write(key, &e));
                }
            };

            if let Err(e) = self.secrets.set(key, value).await {
                warn!(key = %key, error = %e, "Credential write failed, rolling back");
                self.rollback(&applied).await;
                return Err(CredentialStoreError::write(key, &e));
            }
            applied.push((*key, previous));
        }

        debug!(
            has_refresh_token = tokens.refresh_token.is_some(),
            has_id_token = tokens.id_token.is_some(),
            expires_at,
            "Tokens stored"
        );
        Ok(())
    }

    /// Best-effort restore of entries written by a failed `store_tokens`.
    async fn rollback(&self, applied: &[(&str, Option<String>)]) {
        for (key, previous) in applied.iter().rev() {
            let result = match previous {
                Some(value) => self.secrets.set(key, value).await,
                None => self.secrets.delete(key).await,
            };
            if let Err(e) = result {
                warn!(key = %key, error = %e, "Failed to roll back credential entry");
            }
        }
    }

    /// See [`CredentialStoreTrait::get_tokens`].
    ///
    /// # Errors
    /// [`CredentialStoreError::Read`] if any entry cannot be read.
    pub async fn get_tokens(&self) -> Result<Option<TokenSet>, CredentialStoreError> {
        let _guard = self.lock.read().await;

        let access_token = self.read(ACCESS_TOKEN_KEY).await?;
        let refresh_token = self.read(REFRESH_TOKEN_KEY).await?;
        let id_token = self.read(ID_TOKEN_KEY).await?;
        let expires_at = self.read(EXPIRES_AT_KEY).await?;
        let token_type = self.read(TOKEN_TYPE_KEY).await?;

        let (Some(access_token), Some(expires_at), Some(token_type)) =
            (access_token, expires_at, token_type)
        else {
            return Ok(None);
        };

        let Some(expires_at) = parse_expires_at(&expires_at) else {
            warn!("Stored expiry is not a valid timestamp, ignoring stored tokens");
            return Ok(None);
        };

        let remaining_ms = expires_at.saturating_sub(self.clock.millis_since_epoch());
        let expires_in = remaining_ms.div_euclid(1000).max(0);

        Ok(Some(TokenSet { access_token, refresh_token, id_token, expires_in, token_type }))
    }

    /// See [`CredentialStoreTrait::is_token_expired`].
    pub async fn is_token_expired(&self, buffer_seconds: i64) -> bool {
        let _guard = self.lock.read().await;
        self.expired_locked(buffer_seconds).await
    }

    /// See [`CredentialStoreTrait::clear_tokens`].
    ///
    /// # Errors
    /// The first [`CredentialStoreError::Delete`] encountered.
    pub async fn clear_tokens(&self) -> Result<(), CredentialStoreError> {
        let _guard = self.lock.write().await;

        let mut first_error = None;
        for key in TOKEN_KEYS {
            if let Err(e) = self.secrets.delete(key).await {
                warn!(key = %key, error = %e, "Failed to delete credential entry");
                first_error.get_or_insert_with(|| CredentialStoreError::delete(key, &e));
            }
        }

        match first_error {
            Some(err) => Err(err),
            None => {
                debug!("Tokens cleared");
                Ok(())
            }
        }
    }

    /// See [`CredentialStoreTrait::get_valid_access_token`].
    pub async fn get_valid_access_token(&self) -> Option<String> {
        let _guard = self.lock.read().await;
        if self.expired_locked(DEFAULT_EXPIRY_BUFFER_SECONDS).await {
            return None;
        }
        self.read(ACCESS_TOKEN_KEY).await.ok().flatten()
    }

    /// See [`CredentialStoreTrait::seconds_until_expiry`].
    pub async fn seconds_until_expiry(&self) -> Option<i64> {
        let _guard = self.lock.read().await;
        let expires_at = self.read_expires_at().await?;
        Some(expires_at.saturating_sub(self.clock.millis_since_epoch()).div_euclid(1000))
    }

    async fn expired_locked(&self, buffer_seconds: i64) -> bool {
        match self.read_expires_at().await {
            Some(expires_at) => {
                expires_at.saturating_sub(self.clock.millis_since_epoch())
                    <= buffer_seconds.saturating_mul(1000)
            }
            None => true,
        }
    }

    /// `None` when the expiry is absent, unparsable or unreadable.
    async fn read_expires_at(&self) -> Option<i64> {
        match self.secrets.get(EXPIRES_AT_KEY).await {
            Ok(Some(raw)) => parse_expires_at(&raw),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Failed to read token expiry, treating token as expired");
                None
            }
        }
    }

    async fn read(&self, key: &str) -> Result<Option<String>, CredentialStoreError> {
        self.secrets.get(key).await.map_err(|e| CredentialStoreError::read(key, &e))
    }
}

fn parse_expires_at(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}

#[async_trait]
impl CredentialStoreTrait for CredentialStore {
    async fn store_tokens(&self, tokens: &TokenSet) -> Result<(), CredentialStoreError> {
        self.store_tokens(tokens).await
    }

    async fn get_tokens(&self) -> Result<Option<TokenSet>, CredentialStoreError> {
        self.get_tokens().await
    }

    async fn is_token_expired(&self, buffer_seconds: i64) -> bool {
        self.is_token_expired(buffer_seconds).await
    }

    async fn clear_tokens(&self) -> Result<(), CredentialStoreError> {
        self.clear_tokens().await
    }

    async fn get_valid_access_token(&self) -> Option<String> {
        self.get_valid_access_token().await
    }

    async fn seconds_until_expiry(&self) -> Option<i64> {
        self.seconds_until_expiry().await
    }
}
