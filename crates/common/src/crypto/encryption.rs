//! AES-256-GCM encryption primitives
//!
//! - [`EncryptionService`]: AES-256-GCM encryption/decryption with a raw key
//! - [`EncryptedData`]: serializable ciphertext container
//!
//! ```rust
//! use authkeep_common::crypto::encryption::EncryptionService;
//!
//! let key = EncryptionService::generate_key();
//! let service = EncryptionService::new(key)?;
//!
//! let encrypted = service.encrypt_to_string(b"refresh-token")?;
//! assert_eq!(service.decrypt_from_string(&encrypted)?, b"refresh-token");
//! # Ok::<(), authkeep_common::error::CommonError>(())
//! ```

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{CommonError, CommonResult};

const ALGORITHM: &str = "AES-256-GCM";
const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Ciphertext plus the nonce needed to open it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedData {
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
    pub algorithm: String,
}

/// AES-256-GCM with a fixed 32-byte key
#[derive(Clone)]
pub struct EncryptionService {
    key: Zeroizing<Vec<u8>>,
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for EncryptionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionService")
            .field("key", &"[REDACTED]")
            .field("fingerprint", &self.key_fingerprint())
            .finish()
    }
}

impl EncryptionService {
    /// Create a service from a raw 32-byte key.
    pub fn new(key: Vec<u8>) -> CommonResult<Self> {
        let key = Zeroizing::new(key);
        if key.len() != KEY_LEN {
            return Err(CommonError::crypto(format!(
                "Encryption key must be exactly {KEY_LEN} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CommonError::crypto(format!("Failed to create encryption cipher: {e}")))?;

        Ok(Self { key, cipher })
    }

    /// Create a service from a standard base64 encoding of a 32-byte key, as
    /// it appears in configuration.
    pub fn from_base64_key(encoded: &str) -> CommonResult<Self> {
        let key = BASE64
            .decode(encoded.trim())
            .map_err(|e| CommonError::config_field("encryption_key", format!("not valid base64: {e}")))?;
        Self::new(key)
    }

    /// Generate a random 32-byte key.
    #[must_use]
    pub fn generate_key() -> Vec<u8> {
        let mut key = vec![0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        key
    }

    pub fn encrypt(&self, data: &[u8]) -> CommonResult<EncryptedData> {
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(&Nonce::from(nonce), data)
            .map_err(|e| CommonError::crypto(format!("Encryption failed: {e}")))?;

        Ok(EncryptedData { nonce: nonce.to_vec(), ciphertext, algorithm: ALGORITHM.to_string() })
    }

    pub fn decrypt(&self, encrypted: &EncryptedData) -> CommonResult<Vec<u8>> {
        if encrypted.algorithm != ALGORITHM {
            return Err(CommonError::crypto(format!(
                "Unsupported algorithm: {}",
                encrypted.algorithm
            )));
        }

        let nonce: [u8; NONCE_LEN] = encrypted.nonce.as_slice().try_into().map_err(|_| {
            CommonError::crypto(format!("Nonce must be exactly {NONCE_LEN} bytes for {ALGORITHM}"))
        })?;

        self.cipher
            .decrypt(&Nonce::from(nonce), encrypted.ciphertext.as_ref())
            .map_err(|e| CommonError::crypto(format!("Decryption failed: {e}")))
    }

    /// Encrypt bytes and encode the payload as a base64 string.
    pub fn encrypt_to_string(&self, data: &[u8]) -> CommonResult<String> {
        let encrypted = self.encrypt(data)?;
        let serialized = serde_json::to_vec(&encrypted)?;
        Ok(BASE64.encode(serialized))
    }

    /// Decode a base64 string and decrypt the contained payload.
    pub fn decrypt_from_string(&self, encrypted_str: &str) -> CommonResult<Vec<u8>> {
        let decoded = BASE64
            .decode(encrypted_str)
            .map_err(|e| CommonError::crypto(format!("Base64 decode failed: {e}")))?;
        let encrypted: EncryptedData = serde_json::from_slice(&decoded)?;
        self.decrypt(&encrypted)
    }

    /// Short, non-reversible identifier of the key, safe to log.
    #[must_use]
    pub fn key_fingerprint(&self) -> String {
        let digest = Sha256::digest(self.key.as_slice());
        BASE64.encode(&digest[..8])
    }
}
