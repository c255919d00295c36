//! Storage seam for secret values
//!
//! The credential store addresses each token field as its own entry, so a
//! backend only needs string get/set/delete by key.

use async_trait::async_trait;

use super::keychain::KeychainError;

/// Key/value store for secret strings
///
/// Implemented by [`KeychainProvider`](super::KeychainProvider),
/// [`EncryptedFileStore`](super::EncryptedFileStore) and the in-memory test
/// double.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), KeychainError>;

    /// `Ok(None)` when nothing is stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError>;

    /// Remove `key`. Succeeds when the key was never set.
    async fn delete(&self, key: &str) -> Result<(), KeychainError>;
}
