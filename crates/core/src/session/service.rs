//! Session controller - login, logout, restoration and refresh

use std::sync::Arc;

use authkeep_common::auth::credential_store::DEFAULT_EXPIRY_BUFFER_SECONDS;
use authkeep_common::auth::{
    validate_state, CredentialStoreTrait, OAuthClientTrait, PkceChallenge, TokenManager,
    TokenManagerError, TokenSet, ValidToken,
};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::errors::AuthError;
use super::ports::{AuthorizationBrowser, AuthorizationOutcome};
use super::state::SessionState;

/// Owns the session state machine
///
/// `login`, `logout`, `restore_session` and `refresh_token` run one at a
/// time. `get_valid_access_token` does not take the operation lock; it
/// relies on the token manager sharing a single in-flight refresh and
/// discarding refreshes that outlive the session they started in.
pub struct SessionController {
    oauth_client: Arc<dyn OAuthClientTrait>,
    token_manager: Arc<TokenManager>,
    store: Arc<dyn CredentialStoreTrait>,
    browser: Arc<dyn AuthorizationBrowser>,
    state: watch::Sender<SessionState>,
    operation: Mutex<()>,
    refresh_buffer_seconds: i64,
}

impl SessionController {
    /// Create a controller in the `Loading` state. Call
    /// [`restore_session`](Self::restore_session) before showing any UI.
    pub fn new(
        oauth_client: Arc<dyn OAuthClientTrait>,
        store: Arc<dyn CredentialStoreTrait>,
        browser: Arc<dyn AuthorizationBrowser>,
    ) -> Self {
        let token_manager =
            Arc::new(TokenManager::new(Arc::clone(&oauth_client), Arc::clone(&store)));
        let (state, _) = watch::channel(SessionState::loading());

        Self {
            oauth_client,
            token_manager,
            store,
            browser,
            state,
            operation: Mutex::new(()),
            refresh_buffer_seconds: DEFAULT_EXPIRY_BUFFER_SECONDS,
        }
    }

    /// Seconds before expiry at which a token counts as expired
    #[must_use]
    pub fn with_refresh_buffer(mut self, seconds: i64) -> Self {
        self.refresh_buffer_seconds = seconds.max(0);
        self
    }

    #[must_use]
    pub const fn refresh_buffer_seconds(&self) -> i64 {
        self.refresh_buffer_seconds
    }

    #[must_use]
    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStoreTrait> {
        &self.store
    }

    /// Receiver that sees every published snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Interactive sign-in through the authorization browser
    ///
    /// # Errors
    /// - [`AuthError::UserCancelled`] when the browser is dismissed; the
    ///   session goes back to idle without an error message
    /// - [`AuthError::InvalidCredentials`] when the redirect reports an error
    ///   or its `state` does not match
    /// - network, storage or unknown errors from the exchange and profile
    ///   fetch; the snapshot carries the matching message
    pub async fn login(&self) -> Result<(), AuthError> {
        let _guard = self.operation.lock().await;
        self.publish(SessionState::loading());

        match self.run_login().await {
            Ok(state) => {
                info!(user_id = ?state.user.as_ref().map(|u| u.id.as_str()), "Login completed");
                self.publish(state);
                Ok(())
            }
            Err(AuthError::UserCancelled) => {
                info!("Login cancelled by user");
                self.publish(SessionState::idle());
                Err(AuthError::UserCancelled)
            }
            Err(err) => {
                warn!(error = %err, "Login failed");
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    async fn run_login(&self) -> Result<SessionState, AuthError> {
        let pkce = PkceChallenge::generate()?;
        let url = self.oauth_client.authorization_url(&pkce);

        let (code, returned_state) = match self.browser.authorize(&url).await {
            AuthorizationOutcome::Completed { code, state } => (code, state),
            AuthorizationOutcome::Cancelled => return Err(AuthError::UserCancelled),
            AuthorizationOutcome::Failed { error, description } => {
                return Err(AuthError::InvalidCredentials(match description {
                    Some(description) => format!("{error}: {description}"),
                    None => error,
                }));
            }
        };

        if !validate_state(&pkce.state, &returned_state) {
            return Err(AuthError::InvalidCredentials("state mismatch on redirect".to_string()));
        }

        let tokens = self.oauth_client.exchange_code_for_tokens(&code, &pkce.code_verifier).await?;
        drop(pkce);

        self.token_manager.replace_session(&tokens).await?;

        match self.oauth_client.fetch_user_info(&tokens.access_token).await {
            Ok(user) => Ok(SessionState::authenticated(user, tokens)),
            Err(err) => {
                self.discard_credentials("login").await;
                Err(err.into())
            }
        }
    }

    /// Sign out. Always ends idle; storage failures are only logged.
    pub async fn logout(&self) {
        let _guard = self.operation.lock().await;
        self.publish(SessionState::loading());
        self.logout_inner().await;
        info!("Logged out");
    }

    async fn logout_inner(&self) {
        self.discard_credentials("logout").await;
        self.publish(SessionState::idle());
    }

    /// Rebuild the session from stored credentials at startup
    ///
    /// Never surfaces an error. Anything that prevents restoring a valid
    /// session clears the store and ends idle.
    pub async fn restore_session(&self) {
        let _guard = self.operation.lock().await;
        self.publish(SessionState::loading());
        let state = self.run_restore().await;
        info!(authenticated = state.is_authenticated, "Session restoration finished");
        self.publish(state);
    }

    async fn run_restore(&self) -> SessionState {
        let tokens = match self.store.get_tokens().await {
            Ok(Some(tokens)) => tokens,
            Ok(None) => {
                debug!("No stored credentials to restore");
                return SessionState::idle();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read stored credentials");
                return SessionState::idle();
            }
        };

        if !tokens.expires_within(self.refresh_buffer_seconds) {
            return self.restore_profile(tokens).await;
        }

        let Some(refresh_token) = tokens.refresh_token.filter(|token| !token.is_empty()) else {
            info!("Stored token expired without a refresh token");
            self.discard_credentials("restore").await;
            return SessionState::idle();
        };

        match self.token_manager.refresh_access_token(&refresh_token).await {
            Ok(refreshed) => self.restore_profile(refreshed).await,
            Err(err) => {
                warn!(error = %err, "Refresh during restoration failed");
                self.discard_credentials("restore").await;
                SessionState::idle()
            }
        }
    }

    async fn restore_profile(&self, tokens: TokenSet) -> SessionState {
        match self.oauth_client.fetch_user_info(&tokens.access_token).await {
            Ok(user) => SessionState::authenticated(user, tokens),
            Err(err) => {
                warn!(error = %err, "Profile fetch during restoration failed");
                self.discard_credentials("restore").await;
                SessionState::idle()
            }
        }
    }

    /// Refresh the stored tokens now
    ///
    /// On success only `tokens` in the snapshot change. On failure the
    /// session is logged out and the snapshot carries the expiry message.
    ///
    /// # Errors
    /// [`AuthError::RefreshFailed`] for any failure, including a missing
    /// refresh token.
    pub async fn refresh_token(&self) -> Result<TokenSet, AuthError> {
        let _guard = self.operation.lock().await;

        match self.token_manager.refresh_stored_tokens().await {
            Ok(tokens) => {
                debug!(expires_in = tokens.expires_in, "Session tokens refreshed");
                self.state.send_modify(|state| *state = state.with_tokens(tokens.clone()));
                Ok(tokens)
            }
            Err(err) => {
                warn!(error = %err, "Token refresh failed, ending session");
                let err = AuthError::refresh_failed(err);
                self.logout_inner().await;
                self.publish_failure(&err);
                Err(err)
            }
        }
    }

    /// Access token valid beyond the refresh buffer, refreshing if needed
    ///
    /// `Ok(None)` when signed out or when the token expired and cannot be
    /// refreshed.
    ///
    /// # Errors
    /// - [`AuthError::RefreshFailed`] when a needed refresh fails
    /// - [`AuthError::Storage`] when the store cannot be read or the
    ///   refreshed tokens cannot be saved
    pub async fn get_valid_access_token(&self) -> Result<Option<String>, AuthError> {
        match self.token_manager.get_valid_token(self.refresh_buffer_seconds).await {
            Ok(None) => Ok(None),
            Ok(Some(ValidToken::Current(token))) => Ok(Some(token)),
            Ok(Some(ValidToken::Refreshed { tokens, epoch })) => {
                self.state.send_if_modified(|state| {
                    // A sign-in or sign-out since the refresh owns the snapshot.
                    if state.tokens.is_none() || self.token_manager.epoch() != epoch {
                        return false;
                    }
                    *state = state.with_tokens(tokens.clone());
                    true
                });
                Ok(Some(tokens.access_token))
            }
            Err(TokenManagerError::Store(err)) => Err(err.into()),
            Err(err) => Err(AuthError::refresh_failed(err)),
        }
    }

    /// Dismiss the current error message
    pub fn clear_error(&self) {
        self.state.send_if_modified(|state| state.error.take().is_some());
    }

    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn publish_failure(&self, err: &AuthError) {
        match err.user_message() {
            Some(message) => self.publish(SessionState::failed(message)),
            None => self.publish(SessionState::idle()),
        }
    }

    async fn discard_credentials(&self, during: &'static str) {
        if let Err(err) = self.token_manager.clear_session().await {
            warn!(error = %err, during, "Failed to clear stored credentials");
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for session::service.
    use std::time::Duration;

    use async_trait::async_trait;
    use authkeep_common::auth::{CredentialStore, OAuthClientError};
    use authkeep_common::testing::{MockClock, MockOAuthClient, MockSecretStore};
    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::session::state::SessionStatus;

    /// Browser that answers with the state the controller sent
    struct EchoBrowser {
        client: MockOAuthClient,
        outcome: SyncMutex<Option<AuthorizationOutcome>>,
    }

    #[async_trait]
    impl AuthorizationBrowser for EchoBrowser {
        async fn authorize(&self, _url: &str) -> AuthorizationOutcome {
            if let Some(outcome) = self.outcome.lock().clone() {
                return outcome;
            }
            let (state, _) = self.client.last_challenge().unwrap();
            AuthorizationOutcome::Completed { code: "code-1".into(), state }
        }
    }

    struct Harness {
        controller: SessionController,
        client: MockOAuthClient,
        secrets: MockSecretStore,
        clock: MockClock,
        browser: Arc<EchoBrowser>,
    }

    fn harness() -> Harness {
        let client = MockOAuthClient::new();
        let secrets = MockSecretStore::new();
        let clock = MockClock::new();
        let store = Arc::new(CredentialStore::new(Arc::new(secrets.clone()), Arc::new(clock.clone())));
        let browser = Arc::new(EchoBrowser { client: client.clone(), outcome: SyncMutex::new(None) });
        let controller = SessionController::new(Arc::new(client.clone()), store, browser.clone());
        Harness { controller, client, secrets, clock, browser }
    }

    #[test]
    fn starts_loading() {
        let h = harness();
        assert_eq!(h.controller.snapshot().status(), SessionStatus::Loading);
    }

    #[tokio::test]
    async fn login_stores_tokens_and_authenticates() {
        let h = harness();
        h.controller.login().await.unwrap();

        let state = h.controller.snapshot();
        assert!(state.is_authenticated);
        assert_eq!(state.access_token(), Some("mock_access_token"));
        assert_eq!(state.user.unwrap().id, "user-123");
        assert_eq!(h.secrets.value("access_token").as_deref(), Some("mock_access_token"));
        assert_eq!(h.client.user_info_calls(), vec!["mock_access_token".to_string()]);

        let (code, verifier) = h.client.exchange_calls().remove(0);
        assert_eq!(code, "code-1");
        assert_eq!(verifier.len(), 43);
    }

    #[tokio::test]
    async fn login_replaces_stale_entries() {
        let h = harness();
        h.secrets.insert("id_token", "old-id-token");
        h.client.set_exchange_response(TokenSet::new("a1", Some("r1".into()), None, 3600, "Bearer"));

        h.controller.login().await.unwrap();

        assert_eq!(h.secrets.value("id_token"), None);
    }

    #[tokio::test]
    async fn cancelled_login_is_silent() {
        let h = harness();
        *h.browser.outcome.lock() = Some(AuthorizationOutcome::Cancelled);

        assert_eq!(h.controller.login().await, Err(AuthError::UserCancelled));
        let state = h.controller.snapshot();
        assert_eq!(state.status(), SessionStatus::Idle);
        assert_eq!(state.error, None);
        assert!(h.client.exchange_calls().is_empty());
    }

    #[tokio::test]
    async fn failed_redirect_is_invalid_credentials() {
        let h = harness();
        *h.browser.outcome.lock() = Some(AuthorizationOutcome::Failed {
            error: "access_denied".into(),
            description: None,
        });

        let err = h.controller.login().await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials(_)));
        assert_eq!(h.controller.snapshot().error.as_deref(), Some("Authentication failed"));
    }

    #[tokio::test]
    async fn state_mismatch_rejects_code() {
        let h = harness();
        *h.browser.outcome.lock() = Some(AuthorizationOutcome::Completed {
            code: "code-1".into(),
            state: "forged".into(),
        });

        assert!(matches!(h.controller.login().await, Err(AuthError::InvalidCredentials(_))));
        assert_eq!(h.controller.snapshot().error.as_deref(), Some("Authentication failed"));
        assert!(h.client.exchange_calls().is_empty());
    }

    #[tokio::test]
    async fn profile_failure_after_store_clears_tokens() {
        let h = harness();
        h.client.set_user_info_error(OAuthClientError::Status(500));

        let err = h.controller.login().await.unwrap_err();
        assert!(matches!(err, AuthError::Network(_)));
        assert!(h.secrets.is_empty());

        let state = h.controller.snapshot();
        assert!(!state.is_authenticated);
        assert!(state.error.unwrap().starts_with("Unable to reach the sign-in service"));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_storage_error() {
        let h = harness();
        h.secrets.fail_writes_for("token_type");

        assert!(matches!(h.controller.login().await, Err(AuthError::Storage(_))));
        assert!(h.client.user_info_calls().is_empty());
        assert_eq!(h.controller.snapshot().status(), SessionStatus::Error);
    }

    #[tokio::test]
    async fn logout_ignores_clear_failures() {
        let h = harness();
        h.controller.login().await.unwrap();
        h.secrets.fail_deletes(true);

        h.controller.logout().await;

        let state = h.controller.snapshot();
        assert_eq!(state, SessionState::idle());
    }

    #[tokio::test]
    async fn clear_error_only_touches_error() {
        let h = harness();
        *h.browser.outcome.lock() =
            Some(AuthorizationOutcome::Failed { error: "server_error".into(), description: None });
        let _ = h.controller.login().await;
        let mut rx = h.controller.subscribe();
        rx.borrow_and_update();

        h.controller.clear_error();
        assert!(rx.has_changed().unwrap());
        assert_eq!(h.controller.snapshot(), SessionState::idle());

        rx.borrow_and_update();
        h.controller.clear_error();
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn restore_with_valid_token_skips_refresh() {
        let h = harness();
        h.controller
            .store()
            .store_tokens(&TokenSet::new("a1", Some("r1".into()), None, 3600, "Bearer"))
            .await
            .unwrap();

        h.controller.restore_session().await;

        assert_eq!(h.controller.snapshot().access_token(), Some("a1"));
        assert_eq!(h.client.refresh_call_count(), 0);
    }

    #[tokio::test]
    async fn restore_expired_without_refresh_token_clears() {
        let h = harness();
        h.controller
            .store()
            .store_tokens(&TokenSet::new("a1", None, None, 3600, "Bearer"))
            .await
            .unwrap();
        h.clock.advance(Duration::from_secs(3500));

        h.controller.restore_session().await;

        assert_eq!(h.controller.snapshot(), SessionState::idle());
        assert!(h.secrets.is_empty());
        assert_eq!(h.client.refresh_call_count(), 0);
    }

    #[tokio::test]
    async fn restore_read_failure_degrades_to_idle() {
        let h = harness();
        h.secrets.fail_reads(true);

        h.controller.restore_session().await;

        assert_eq!(h.controller.snapshot(), SessionState::idle());
    }

    #[tokio::test]
    async fn refresh_token_keeps_user() {
        let h = harness();
        h.controller.login().await.unwrap();
        let user = h.controller.snapshot().user;

        let tokens = h.controller.refresh_token().await.unwrap();

        assert_eq!(tokens.access_token, "refreshed_access_token");
        let state = h.controller.snapshot();
        assert_eq!(state.user, user);
        assert_eq!(state.access_token(), Some("refreshed_access_token"));
        assert_eq!(h.client.refresh_calls(), vec!["mock_refresh_token".to_string()]);
    }

    #[tokio::test]
    async fn get_valid_access_token_refreshes_inside_buffer() {
        let h = harness();
        h.controller.login().await.unwrap();
        h.clock.advance(Duration::from_secs(3400));

        let token = h.controller.get_valid_access_token().await.unwrap();

        assert_eq!(token.as_deref(), Some("refreshed_access_token"));
        assert_eq!(h.controller.snapshot().access_token(), Some("refreshed_access_token"));
        assert!(h.controller.snapshot().user.is_some());
    }

    #[tokio::test]
    async fn get_valid_access_token_refresh_failure() {
        let h = harness();
        h.controller.login().await.unwrap();
        h.clock.advance(Duration::from_secs(3400));
        h.client.set_refresh_error(OAuthClientError::Status(400));

        let err = h.controller.get_valid_access_token().await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    /// Validates that logout wins over a refresh already in flight.
    ///
    /// Assertions:
    /// - The waiting caller gets no token.
    /// - The store stays empty after the refresh response arrives.
    /// - A restart does not bring the session back.
    #[tokio::test]
    async fn logout_during_refresh_stays_logged_out() {
        let h = harness();
        h.controller.login().await.unwrap();
        h.clock.advance(Duration::from_secs(3400));
        h.client.set_delay(Duration::from_millis(100));

        let controller = Arc::new(h.controller);
        let pending = tokio::spawn({
            let controller = Arc::clone(&controller);
            async move { controller.get_valid_access_token().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        controller.logout().await;

        assert_eq!(pending.await.unwrap(), Ok(None));
        assert!(h.secrets.is_empty());
        assert_eq!(controller.snapshot(), SessionState::idle());
        assert_eq!(h.client.refresh_call_count(), 1);

        controller.restore_session().await;
        assert!(!controller.snapshot().is_authenticated);
    }

    #[tokio::test]
    async fn get_valid_access_token_signed_out() {
        let h = harness();
        assert_eq!(h.controller.get_valid_access_token().await, Ok(None));
    }
}
