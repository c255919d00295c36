//! OAuth 2.0 HTTP client
//!
//! Talks to the authorization server's token and userinfo endpoints:
//! - Authorization URL building (PKCE + state)
//! - Authorization code exchange
//! - Token refresh
//! - Userinfo fetch
//!
//! Every call is a single attempt. Failures are classified here, once, into
//! [`OAuthClientError`].

use async_trait::async_trait;
use reqwest::{Client, Response};
use thiserror::Error;
use tracing::{debug, warn};

use super::pkce::PkceChallenge;
use super::traits::OAuthClientTrait;
use super::types::{OAuthConfig, OAuthError, TokenResponse, TokenSet, UserInfoClaims, UserProfile};

/// Error type for OAuth client operations
///
/// `Clone` so one outcome can be handed to every caller sharing an in-flight
/// refresh.
#[derive(Debug, Clone, Error)]
pub enum OAuthClientError {
    /// Connection, TLS or protocol failure before a response arrived
    #[error("HTTP request failed: {0}")]
    Transport(String),

    /// The configured request timeout elapsed
    #[error("HTTP request timed out")]
    Timeout,

    /// The server answered with an RFC 6749 error body
    #[error("OAuth error: {0}")]
    OAuth(OAuthError),

    /// Non-success status without a parsable error body
    #[error("Unexpected HTTP status {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for OAuthClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// OAuth 2.0 public client (RFC 6749 + RFC 7636)
#[derive(Debug, Clone)]
pub struct OAuthClient {
    config: OAuthConfig,
    client: Client,
}

impl OAuthClient {
    /// Create a client whose requests time out after
    /// `config.request_timeout`.
    ///
    /// # Errors
    /// Returns [`OAuthClientError::Config`] if the HTTP client cannot be
    /// built (TLS backend initialisation).
    pub fn new(config: OAuthConfig) -> Result<Self, OAuthClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| OAuthClientError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Build the browser URL for one authorization attempt
    ///
    /// ```
    /// use authkeep_common::auth::{OAuthClient, OAuthConfig, PkceChallenge};
    ///
    /// let config = OAuthConfig::new(
    ///     "client",
    ///     "https://auth.example.com/authorize",
    ///     "https://auth.example.com/oauth/token",
    ///     "https://auth.example.com/userinfo",
    ///     "http://127.0.0.1:8765/callback",
    /// );
    /// let client = OAuthClient::new(config).unwrap();
    /// let pkce = PkceChallenge::generate().unwrap();
    /// let url = client.authorization_url(&pkce);
    /// assert!(url.contains("code_challenge_method=S256"));
    /// ```
    #[must_use]
    pub fn authorization_url(&self, challenge: &PkceChallenge) -> String {
        let mut params: Vec<(&str, &str)> = vec![
            ("response_type", "code"),
            ("client_id", &self.config.client_id),
            ("redirect_uri", &self.config.redirect_uri),
            ("state", &challenge.state),
            ("code_challenge", &challenge.code_challenge),
            ("code_challenge_method", challenge.challenge_method()),
        ];
        let scope = self.config.scope_string();
        if !scope.is_empty() {
            params.push(("scope", &scope));
        }
        params.extend(
            self.config.extra_authorize_params.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        );

        let query_string = params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        let separator = if self.config.authorization_endpoint.contains('?') { '&' } else { '?' };
        format!("{}{separator}{query_string}", self.config.authorization_endpoint)
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Errors
    /// - [`OAuthClientError::OAuth`] / [`OAuthClientError::Status`] for a
    ///   non-success response
    /// - [`OAuthClientError::Transport`] / [`OAuthClientError::Timeout`] if
    ///   the server could not be reached
    /// - [`OAuthClientError::Parse`] if the success body is malformed
    pub async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.config.client_id.as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        debug!(endpoint = %self.config.token_endpoint, "Exchanging authorization code");
        let response = self.client.post(&self.config.token_endpoint).form(&params).send().await?;
        let token_response: TokenResponse = parse_success(response).await?;

        debug!(
            has_refresh_token = token_response.refresh_token.is_some(),
            expires_in = token_response.expires_in,
            "Authorization code exchanged"
        );
        Ok(token_response.into())
    }

    /// Obtain a new access token with a refresh token
    ///
    /// When the server does not rotate the refresh token, `refresh_token` is
    /// carried forward into the returned set.
    ///
    /// # Errors
    /// [`OAuthClientError::NoRefreshToken`] for an empty token (no request is
    /// made), otherwise as for
    /// [`exchange_code_for_tokens`](Self::exchange_code_for_tokens).
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        if refresh_token.is_empty() {
            return Err(OAuthClientError::NoRefreshToken);
        }

        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.config.client_id.as_str()),
            ("refresh_token", refresh_token),
        ];

        debug!(endpoint = %self.config.token_endpoint, "Refreshing access token");
        let response = self.client.post(&self.config.token_endpoint).form(&params).send().await?;
        let token_response: TokenResponse = parse_success(response).await?;

        let rotated = token_response.refresh_token.is_some();
        let mut tokens = TokenSet::from(token_response);
        if !rotated {
            tokens.refresh_token = Some(refresh_token.to_string());
        }

        debug!(rotated, expires_in = tokens.expires_in, "Access token refreshed");
        Ok(tokens)
    }

    /// Fetch the signed-in user's profile
    ///
    /// # Errors
    /// As for [`exchange_code_for_tokens`](Self::exchange_code_for_tokens).
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, OAuthClientError> {
        debug!(endpoint = %self.config.userinfo_endpoint, "Fetching user info");
        let response =
            self.client.get(&self.config.userinfo_endpoint).bearer_auth(access_token).send().await?;
        let claims: UserInfoClaims = parse_success(response).await?;

        Ok(claims.into())
    }

    #[must_use]
    pub fn redirect_uri(&self) -> &str {
        &self.config.redirect_uri
    }

    #[must_use]
    pub const fn config(&self) -> &OAuthConfig {
        &self.config
    }
}

/// Decode a success body, or classify a failure response.
async fn parse_success<T: serde::de::DeserializeOwned>(
    response: Response,
) -> Result<T, OAuthClientError> {
    let status = response.status();
    if status.is_success() {
        return response.json::<T>().await.map_err(|e| {
            if e.is_timeout() {
                OAuthClientError::Timeout
            } else {
                OAuthClientError::Parse(e.to_string())
            }
        });
    }

    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<OAuthError>(&body) {
        Ok(error) => {
            warn!(status = status.as_u16(), error = %error.error, "Authorization server rejected request");
            Err(OAuthClientError::OAuth(error))
        }
        Err(_) => {
            warn!(status = status.as_u16(), "Authorization server returned an error status");
            Err(OAuthClientError::Status(status.as_u16()))
        }
    }
}

#[async_trait]
impl OAuthClientTrait for OAuthClient {
    fn authorization_url(&self, challenge: &PkceChallenge) -> String {
        self.authorization_url(challenge)
    }

    async fn exchange_code_for_tokens(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.exchange_code_for_tokens(code, code_verifier).await
    }

    async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenSet, OAuthClientError> {
        self.refresh_access_token(refresh_token).await
    }

    async fn fetch_user_info(&self, access_token: &str) -> Result<UserProfile, OAuthClientError> {
        self.fetch_user_info(access_token).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for auth::client. HTTP round-trips live in
    //! `tests/auth_integration.rs`.
    use super::*;

    fn create_test_config() -> OAuthConfig {
        OAuthConfig::new(
            "test_client_id",
            "https://auth.example.com/authorize",
            "https://auth.example.com/oauth/token",
            "https://auth.example.com/userinfo",
            "http://127.0.0.1:8765/callback",
        )
        .with_scopes(vec!["openid".to_string(), "profile".to_string()])
        .with_authorize_param("audience", "https://api.example.com")
    }

    /// Validates `OAuthClient::authorization_url` query construction.
    ///
    /// Assertions:
    /// - URL starts with the authorization endpoint.
    /// - Carries response type, client id, encoded redirect URI, scope,
    ///   state, challenge and method.
    /// - Extra parameters are appended and URL-encoded.
    #[test]
    fn test_authorization_url() {
        let client = OAuthClient::new(create_test_config()).expect("client");
        let pkce = PkceChallenge::generate().expect("pkce");

        let url = client.authorization_url(&pkce);

        assert!(url.starts_with("https://auth.example.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2F127.0.0.1%3A8765%2Fcallback"));
        assert!(url.contains("scope=openid%20profile"));
        assert!(url.contains(&format!("state={}", pkce.state)));
        assert!(url.contains(&format!("code_challenge={}", pkce.code_challenge)));
        assert!(url.contains("code_challenge_method=S256"));
        assert!(url.contains("audience=https%3A%2F%2Fapi.example.com"));
        assert!(!url.contains(&pkce.code_verifier));
    }

    /// Validates that an endpoint with its own query string is extended with
    /// `&`.
    #[test]
    fn test_authorization_url_with_existing_query() {
        let mut config = create_test_config();
        config.authorization_endpoint = "https://auth.example.com/authorize?tenant=acme".into();
        let client = OAuthClient::new(config).expect("client");
        let pkce = PkceChallenge::generate().expect("pkce");

        let url = client.authorization_url(&pkce);

        assert!(url.starts_with("https://auth.example.com/authorize?tenant=acme&response_type=code"));
    }

    /// Validates the empty refresh token short-circuit.
    ///
    /// Assertions:
    /// - Returns `NoRefreshToken` without touching the (unreachable) server.
    #[tokio::test]
    async fn test_refresh_with_empty_token() {
        let client = OAuthClient::new(create_test_config()).expect("client");

        let result = client.refresh_access_token("").await;
        assert!(matches!(result, Err(OAuthClientError::NoRefreshToken)));
    }

    #[test]
    fn test_oauth_client_config_access() {
        let client = OAuthClient::new(create_test_config()).expect("client");

        assert_eq!(client.config().client_id, "test_client_id");
        assert_eq!(client.redirect_uri(), "http://127.0.0.1:8765/callback");
    }
}
