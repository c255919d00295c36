//! Platform keychain provider for secure credential storage
//!
//! Thin wrapper over the platform keychain: macOS Keychain Services,
//! Windows Credential Manager and the Linux kernel keyring / Secret Service,
//! all through the `keyring` crate. Every key becomes one entry under the
//! provider's service name.
//!
//! ```no_run
//! use authkeep_common::security::KeychainProvider;
//!
//! let keychain = KeychainProvider::new("authkeep");
//! keychain.set_secret("access_token", "eyJ...")?;
//! assert_eq!(keychain.get_secret("access_token")?.as_deref(), Some("eyJ..."));
//! # Ok::<(), authkeep_common::security::KeychainError>(())
//! ```

use async_trait::async_trait;
use keyring::Entry;
use thiserror::Error;
use tracing::debug;

use super::traits::SecretStore;
use crate::error::CommonError;

#[derive(Debug, Error)]
pub enum KeychainError {
    /// The backing store is unavailable or refused the operation
    #[error("Keychain access failed: {0}")]
    AccessFailed(String),

    #[error("Secret not found")]
    NotFound,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Encrypting or decrypting a stored value failed
    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<CommonError> for KeychainError {
    fn from(err: CommonError) -> Self {
        match err {
            CommonError::Crypto { message } | CommonError::Config { message, .. } => {
                Self::Crypto(message)
            }
            other => Self::AccessFailed(other.to_string()),
        }
    }
}

/// Platform keychain provider scoped to one service name
#[derive(Debug, Clone)]
pub struct KeychainProvider {
    service_name: String,
}

impl KeychainProvider {
    /// # Arguments
    /// * `service_name` - Service identifier entries are filed under (e.g.
    ///   `"authkeep"`, `"com.example.app.auth"`)
    pub fn new(service_name: impl Into<String>) -> Self {
        Self { service_name: service_name.into() }
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Store a secret value in the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Storing secret in keychain");

        let entry = self.create_entry(key)?;
        entry.set_password(value).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to store secret for {key}: {e}"))
        })?;

        Ok(())
    }

    /// Retrieve a secret value from the platform keychain
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError> {
        debug!(service = %self.service_name, key = %key, "Retrieving secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to retrieve secret for {key}: {e}"
            ))),
        }
    }

    /// Delete a secret from the platform keychain (idempotent)
    ///
    /// # Errors
    /// Returns `KeychainError::AccessFailed` if keychain access fails
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        debug!(service = %self.service_name, key = %key, "Deleting secret from keychain");

        let entry = self.create_entry(key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to delete secret for {key}: {e}"
            ))),
        }
    }

    fn create_entry(&self, key: &str) -> Result<Entry, KeychainError> {
        Entry::new(&self.service_name, key).map_err(|e| {
            KeychainError::AccessFailed(format!("Failed to create keychain entry for {key}: {e}"))
        })
    }

    /// Run a blocking keychain call off the async executor.
    async fn blocking<T, F>(&self, op: F) -> Result<T, KeychainError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, KeychainError> + Send + 'static,
    {
        let provider = self.clone();
        tokio::task::spawn_blocking(move || op(provider))
            .await
            .map_err(|e| KeychainError::AccessFailed(format!("Keychain task failed: {e}")))?
    }
}

#[async_trait]
impl SecretStore for KeychainProvider {
    async fn set(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let key = key.to_string();
        let value = zeroize::Zeroizing::new(value.to_string());
        self.blocking(move |provider| provider.set_secret(&key, &value)).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError> {
        let key = key.to_string();
        self.blocking(move |provider| provider.get_secret(&key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), KeychainError> {
        let key = key.to_string();
        self.blocking(move |provider| provider.delete_secret(&key)).await
    }
}
