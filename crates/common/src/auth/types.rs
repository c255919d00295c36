//! OAuth 2.0 types and structures
//!
//! Wire formats for the token and userinfo endpoints and the client-side
//! configuration of one authorization server registration.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Access credentials issued by the token endpoint
///
/// `expires_in` is always the *remaining* lifetime in seconds at the moment
/// the value was produced: verbatim from the server after an exchange or
/// refresh, re-derived from the stored absolute expiry after a read.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    /// Absent when the server does not issue one; the session then cannot
    /// renew itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// OpenID Connect ID token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,

    /// Remaining lifetime in seconds
    pub expires_in: i64,

    pub token_type: String,
}

impl TokenSet {
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        id_token: Option<String>,
        expires_in: i64,
        token_type: impl Into<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            id_token,
            expires_in,
            token_type: token_type.into(),
        }
    }

    /// Whether the session backed by this set can renew itself
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|token| !token.is_empty())
    }

    /// Whether `expires_in` is at or inside `buffer_seconds`.
    ///
    /// Sets read back from the store carry the remaining lifetime, so this
    /// judges the token and its expiry from the same read. A spent token
    /// (`expires_in == 0`) is always inside the buffer.
    #[must_use]
    pub fn expires_within(&self, buffer_seconds: i64) -> bool {
        self.expires_in <= buffer_seconds.max(0)
    }
}

impl fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[redacted]"))
            .field("id_token", &self.id_token.as_ref().map(|_| "[redacted]"))
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Token endpoint success body (RFC 6749 §5.1)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub id_token: Option<String>,
    pub expires_in: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl From<TokenResponse> for TokenSet {
    fn from(response: TokenResponse) -> Self {
        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            id_token: response.id_token,
            expires_in: response.expires_in,
            token_type: response.token_type,
        }
    }
}

/// Profile of the signed-in user, derived from userinfo claims
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub organization_id: Option<String>,
}

/// Standard OpenID Connect claims returned by the userinfo endpoint
#[derive(Debug, Deserialize)]
pub struct UserInfoClaims {
    pub sub: String,
    pub email: String,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
    pub organization_id: Option<String>,
}

impl From<UserInfoClaims> for UserProfile {
    fn from(claims: UserInfoClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            first_name: claims.given_name,
            last_name: claims.family_name,
            profile_picture_url: claims.picture,
            organization_id: claims.organization_id,
        }
    }
}

/// Client registration and endpoints of one authorization server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub client_id: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    /// Loopback address for desktop apps, custom scheme for mobile
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Provider-specific authorization parameters such as `audience`
    pub extra_authorize_params: BTreeMap<String, String>,
    pub request_timeout: Duration,
}

impl OAuthConfig {
    /// Configuration with `openid profile email offline_access` scopes and a
    /// 30 second request timeout
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        authorization_endpoint: impl Into<String>,
        token_endpoint: impl Into<String>,
        userinfo_endpoint: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            authorization_endpoint: authorization_endpoint.into(),
            token_endpoint: token_endpoint.into(),
            userinfo_endpoint: userinfo_endpoint.into(),
            redirect_uri: redirect_uri.into(),
            scopes: ["openid", "profile", "email", "offline_access"]
                .iter()
                .map(|scope| (*scope).to_string())
                .collect(),
            extra_authorize_params: BTreeMap::new(),
            request_timeout: Duration::from_secs(30),
        }
    }

    #[must_use]
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    #[must_use]
    pub fn with_authorize_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_authorize_params.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Scopes as a space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// OAuth error response body (RFC 6749 §5.2)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthError {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for OAuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for OAuthError {}
