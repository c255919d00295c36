//! Encrypted file secret store
//!
//! For hosts without a usable keychain (headless Linux, containers, CI).
//! All entries live in one JSON file; each value is sealed individually with
//! AES-256-GCM. Every write replaces the whole file through a temporary file
//! in the same directory followed by a rename, so readers never see a partial
//! file.

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::keychain::KeychainError;
use super::traits::SecretStore;
use crate::crypto::EncryptionService;

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    entries: BTreeMap<String, String>,
}

struct Inner {
    path: PathBuf,
    cipher: EncryptionService,
    lock: Mutex<()>,
}

/// AES-256-GCM encrypted secret store backed by a single file
#[derive(Clone)]
pub struct EncryptedFileStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for EncryptedFileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedFileStore")
            .field("path", &self.inner.path)
            .field("key_fingerprint", &self.inner.cipher.key_fingerprint())
            .finish()
    }
}

impl EncryptedFileStore {
    /// The file is created on first write; its directory is created if
    /// missing.
    pub fn new(path: impl Into<PathBuf>, cipher: EncryptionService) -> Self {
        Self { inner: Arc::new(Inner { path: path.into(), cipher, lock: Mutex::new(()) }) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// # Errors
    /// `KeychainError::AccessFailed` on I/O failure, `KeychainError::Crypto`
    /// if encryption fails.
    pub fn set_secret(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let _guard = self.inner.lock.lock();
        let mut file = self.load()?;
        let sealed = self.inner.cipher.encrypt_to_string(value.as_bytes())?;
        file.entries.insert(key.to_string(), sealed);
        self.save(&file)?;

        debug!(path = %self.inner.path.display(), key = %key, "Secret written to encrypted file");
        Ok(())
    }

    /// # Errors
    /// `KeychainError::Crypto` if the stored value cannot be decrypted with
    /// this store's key.
    pub fn get_secret(&self, key: &str) -> Result<Option<String>, KeychainError> {
        let _guard = self.inner.lock.lock();
        let file = self.load()?;
        let Some(sealed) = file.entries.get(key) else {
            return Ok(None);
        };

        let plaintext = self.inner.cipher.decrypt_from_string(sealed)?;
        String::from_utf8(plaintext)
            .map(Some)
            .map_err(|e| KeychainError::Crypto(format!("Stored value for {key} is not UTF-8: {e}")))
    }

    /// Idempotent; the file is left untouched when `key` is absent.
    ///
    /// # Errors
    /// `KeychainError::AccessFailed` on I/O failure.
    pub fn delete_secret(&self, key: &str) -> Result<(), KeychainError> {
        let _guard = self.inner.lock.lock();
        let mut file = self.load()?;
        if file.entries.remove(key).is_some() {
            self.save(&file)?;
            debug!(path = %self.inner.path.display(), key = %key, "Secret removed from encrypted file");
        }
        Ok(())
    }

    fn load(&self) -> Result<StoreFile, KeychainError> {
        match fs::read(&self.inner.path) {
            Ok(bytes) => {
                let file: StoreFile = serde_json::from_slice(&bytes)?;
                if file.version != FORMAT_VERSION {
                    return Err(KeychainError::AccessFailed(format!(
                        "Unsupported secret file version {} in {}",
                        file.version,
                        self.inner.path.display()
                    )));
                }
                Ok(file)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Ok(StoreFile { version: FORMAT_VERSION, entries: BTreeMap::new() })
            }
            Err(e) => Err(KeychainError::AccessFailed(format!(
                "Failed to read {}: {e}",
                self.inner.path.display()
            ))),
        }
    }

    fn save(&self, file: &StoreFile) -> Result<(), KeychainError> {
        let path = &self.inner.path;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let io_err = |e: std::io::Error| {
            KeychainError::AccessFailed(format!("Failed to write {}: {e}", path.display()))
        };

        fs::create_dir_all(&dir).map_err(io_err)?;
        let mut tmp = NamedTempFile::new_in(&dir).map_err(io_err)?;
        let bytes = serde_json::to_vec_pretty(file)?;
        tmp.write_all(&bytes).map_err(io_err)?;
        tmp.as_file().sync_all().map_err(io_err)?;
        tmp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }

    async fn blocking<T, F>(&self, op: F) -> Result<T, KeychainError>
    where
        T: Send + 'static,
        F: FnOnce(Self) -> Result<T, KeychainError> + Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(store))
            .await
            .map_err(|e| KeychainError::AccessFailed(format!("Secret file task failed: {e}")))?
    }
}

#[async_trait]
impl SecretStore for EncryptedFileStore {
    async fn set(&self, key: &str, value: &str) -> Result<(), KeychainError> {
        let key = key.to_string();
        let value = zeroize::Zeroizing::new(value.to_string());
        self.blocking(move |store| store.set_secret(&key, &value)).await
    }

    async fn get(&self, key: &str) -> Result<Option<String>, KeychainError> {
        let key = key.to_string();
        self.blocking(move |store| store.get_secret(&key)).await
    }

    async fn delete(&self, key: &str) -> Result<(), KeychainError> {
        let key = key.to_string();
        self.blocking(move |store| store.delete_secret(&key)).await
    }
}
