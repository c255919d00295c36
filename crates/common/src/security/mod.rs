//! Secret storage backends
//!
//! - [`KeychainProvider`]: platform keychain (default)
//! - [`EncryptedFileStore`]: AES-256-GCM encrypted file for hosts without a
//!   keychain
//!
//! Both implement [`SecretStore`], the seam the credential store is written
//! against.

pub mod file_store;
pub mod keychain;
pub mod traits;

pub use file_store::EncryptedFileStore;
pub use keychain::{KeychainError, KeychainProvider};
pub use traits::SecretStore;
