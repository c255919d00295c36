//! Session snapshot published to subscribers

use authkeep_common::auth::{TokenSet, UserProfile};
use serde::Serialize;

/// Observable session state
///
/// `is_authenticated` is true exactly when both `user` and `tokens` are set;
/// the constructors below are the only way the controller builds a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionState {
    pub user: Option<UserProfile>,
    pub tokens: Option<TokenSet>,
    pub is_loading: bool,
    pub is_authenticated: bool,
    pub error: Option<String>,
}

/// Coarse state derived from a [`SessionState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Loading,
    Authenticated,
    Error,
}

impl SessionState {
    /// Logged out, nothing in flight
    #[must_use]
    pub const fn idle() -> Self {
        Self { user: None, tokens: None, is_loading: false, is_authenticated: false, error: None }
    }

    /// An operation is in flight
    #[must_use]
    pub fn loading() -> Self {
        Self { is_loading: true, ..Self::idle() }
    }

    #[must_use]
    pub fn authenticated(user: UserProfile, tokens: TokenSet) -> Self {
        Self {
            user: Some(user),
            tokens: Some(tokens),
            is_loading: false,
            is_authenticated: true,
            error: None,
        }
    }

    /// Logged out with a message for the user
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::idle() }
    }

    #[must_use]
    pub fn status(&self) -> SessionStatus {
        if self.is_loading {
            SessionStatus::Loading
        } else if self.is_authenticated {
            SessionStatus::Authenticated
        } else if self.error.is_some() {
            SessionStatus::Error
        } else {
            SessionStatus::Idle
        }
    }

    /// Current access token, if authenticated
    #[must_use]
    pub fn access_token(&self) -> Option<&str> {
        self.tokens.as_ref().map(|tokens| tokens.access_token.as_str())
    }

    /// Same state with `tokens` replaced; `user` and `error` are kept
    pub(crate) fn with_tokens(&self, tokens: TokenSet) -> Self {
        Self {
            is_authenticated: self.user.is_some(),
            tokens: Some(tokens),
            ..self.clone()
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::idle()
    }
}
