//! Session error taxonomy
//!
//! Lower-layer errors are classified into [`AuthError`] once, when they
//! reach the controller. [`AuthError::user_message`] is the only place a
//! message shown to the user is chosen.

use authkeep_common::auth::{CredentialStoreError, OAuthClientError, PkceError, TokenManagerError};
use thiserror::Error;

const NETWORK_MESSAGE: &str =
    "Unable to reach the sign-in service. Please check your connection and try again";
const INVALID_CREDENTIALS_MESSAGE: &str = "Authentication failed";
const TOKEN_EXPIRED_MESSAGE: &str = "Your session has expired";
const REFRESH_FAILED_MESSAGE: &str = "Your session has expired. Please log in again";
const STORAGE_MESSAGE: &str = "Unable to save your sign-in securely. Please try again";
const UNKNOWN_MESSAGE: &str = "Something went wrong while signing in. Please try again";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("network error: {0}")]
    Network(String),

    #[error("authorization cancelled by user")]
    UserCancelled,

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token expired")]
    TokenExpired,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error("credential storage error: {0}")]
    Storage(String),

    #[error("{0}")]
    Unknown(String),
}

impl AuthError {
    /// Message for the session snapshot, `None` for silent outcomes
    ///
    /// Causes stay in the variant (and the logs); none reaches the user.
    #[must_use]
    pub fn user_message(&self) -> Option<String> {
        let message = match self {
            Self::UserCancelled => return None,
            Self::Network(_) => NETWORK_MESSAGE,
            Self::InvalidCredentials(_) => INVALID_CREDENTIALS_MESSAGE,
            Self::TokenExpired => TOKEN_EXPIRED_MESSAGE,
            Self::RefreshFailed(_) => REFRESH_FAILED_MESSAGE,
            Self::Storage(_) => STORAGE_MESSAGE,
            Self::Unknown(_) => UNKNOWN_MESSAGE,
        };
        Some(message.to_string())
    }

    /// Any failure on the refresh path ends the session
    pub(crate) fn refresh_failed(cause: impl std::fmt::Display) -> Self {
        Self::RefreshFailed(cause.to_string())
    }
}

impl From<OAuthClientError> for AuthError {
    fn from(err: OAuthClientError) -> Self {
        match err {
            OAuthClientError::Transport(_)
            | OAuthClientError::Timeout
            | OAuthClientError::Status(_) => Self::Network(err.to_string()),
            OAuthClientError::OAuth(body) => Self::InvalidCredentials(body.to_string()),
            OAuthClientError::NoRefreshToken => Self::refresh_failed(err),
            OAuthClientError::Parse(_) | OAuthClientError::Config(_) => {
                Self::Unknown(err.to_string())
            }
        }
    }
}

impl From<CredentialStoreError> for AuthError {
    fn from(err: CredentialStoreError) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<TokenManagerError> for AuthError {
    fn from(err: TokenManagerError) -> Self {
        match err {
            TokenManagerError::Client(inner) => inner.into(),
            TokenManagerError::Store(inner) => inner.into(),
            TokenManagerError::NoRefreshToken | TokenManagerError::Superseded => {
                Self::refresh_failed(err)
            }
        }
    }
}

impl From<PkceError> for AuthError {
    fn from(err: PkceError) -> Self {
        Self::Unknown(err.to_string())
    }
}
