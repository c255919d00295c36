//! OAuth 2.0 Authorization Code + PKCE protocol layer
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │  TokenManager    │  refresh + persist, single-flight
//! └────────┬─────────┘
//!          │
//!          ├──► OAuthClient        (token / userinfo endpoints)
//!          │
//!          └──► CredentialStore    (five-entry token persistence)
//!                    │
//!                    └──► SecretStore  (keychain, encrypted file, mock)
//!
//!   PKCE utilities (verifier, S256 challenge, CSRF state)
//! ```
//!
//! The session state machine built on top of these lives in
//! `authkeep-core`.
//!
//! # Module Organization
//!
//! - **[`types`]**: wire and configuration types (`TokenSet`, `UserProfile`,
//!   `OAuthConfig`, `OAuthError`)
//! - **[`pkce`]**: PKCE challenge generation and state validation
//! - **[`client`]**: HTTP client for code exchange, refresh and userinfo
//! - **[`credential_store`]**: durable token storage with absolute expiry
//! - **[`token_manager`]**: refresh coordination
//! - **[`traits`]**: seams for the above
//!
//! # Security
//!
//! - No client secret: PKCE binds the code to this client
//! - `state` is compared in constant time
//! - Verifier and state are zeroed when the challenge is dropped
//! - Token material never appears in `Debug` output or logs

pub mod client;
pub mod credential_store;
pub mod pkce;
pub mod token_manager;
pub mod traits;
pub mod types;

pub use client::{OAuthClient, OAuthClientError};
pub use credential_store::{CredentialStore, CredentialStoreError};
pub use pkce::{
    generate_code_challenge, generate_code_verifier, generate_state, validate_state, PkceChallenge,
    PkceError,
};
pub use token_manager::{TokenManager, TokenManagerError, ValidToken};
pub use traits::{CredentialStoreTrait, OAuthClientTrait};
pub use types::{OAuthConfig, OAuthError, TokenResponse, TokenSet, UserInfoClaims, UserProfile};
