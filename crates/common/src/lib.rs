//! Protocol layer for Authkeep.
//!
//! - [`auth`]: PKCE, OAuth client, credential store, token manager
//! - [`security`]: secret storage backends (platform keychain, encrypted
//!   file)
//! - [`crypto`]: AES-256-GCM primitives for the encrypted file backend
//! - [`time`]: wall-clock abstraction used for token expiry
//! - [`error`]: shared error type for the helpers above
//!
//! # Features
//!
//! - `test-utils`: exposes [`testing`] (in-memory secret store, scripted
//!   OAuth client, controllable clock) to downstream test suites

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod auth;
pub mod crypto;
pub mod error;
pub mod security;
pub mod time;

#[cfg(any(feature = "test-utils", test))]
pub mod testing;

pub use auth::{
    CredentialStore, CredentialStoreError, OAuthClient, OAuthClientError, OAuthConfig,
    PkceChallenge, TokenManager, TokenManagerError, TokenSet, UserProfile,
};
pub use crypto::{EncryptedData, EncryptionService};
pub use error::{CommonError, CommonResult};
pub use security::{EncryptedFileStore, KeychainError, KeychainProvider, SecretStore};
pub use time::{Clock, SystemClock};
