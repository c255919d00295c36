//! End-to-end session scenarios over in-memory doubles

mod support;

use std::time::Duration;

use authkeep_common::auth::{OAuthClientError, TokenSet};
use authkeep_core::{AuthError, AuthorizationOutcome, SessionState, SessionStatus};
use support::Session;

fn expiring_tokens(refresh_token: Option<&str>) -> TokenSet {
    TokenSet::new("stale_access", refresh_token.map(str::to_string), None, 3600, "Bearer")
}

/// Restoring with nothing stored.
///
/// # Test Steps
/// 1. Build a controller over an empty store
/// 2. Run startup restoration
/// 3. Verify the session is idle with no error and no network calls
#[tokio::test]
async fn restore_with_empty_store_is_idle() {
    let session = Session::new();
    assert_eq!(session.controller.snapshot().status(), SessionStatus::Loading);

    session.controller.restore_session().await;

    let state = session.controller.snapshot();
    assert_eq!(state, SessionState::idle());
    assert_eq!(session.client.refresh_call_count(), 0);
    assert!(session.client.user_info_calls().is_empty());
}

/// Restoring an expired session that can be refreshed.
///
/// # Test Steps
/// 1. Store tokens and move the clock into the refresh buffer
/// 2. Run startup restoration
/// 3. Verify one refresh, one profile fetch with the new token, and an
///    authenticated session
#[tokio::test]
async fn restore_refreshes_expired_session() {
    let session = Session::new();
    session.controller.store().store_tokens(&expiring_tokens(Some("r1"))).await.unwrap();
    session.clock.advance(Duration::from_secs(3_500));

    session.controller.restore_session().await;

    assert_eq!(session.client.refresh_calls(), vec!["r1".to_string()]);
    assert_eq!(session.client.user_info_calls(), vec!["refreshed_access_token".to_string()]);

    let state = session.controller.snapshot();
    assert!(state.is_authenticated);
    assert_eq!(state.access_token(), Some("refreshed_access_token"));
    assert_eq!(state.error, None);
    assert_eq!(
        session.secrets.value("access_token").as_deref(),
        Some("refreshed_access_token")
    );
}

#[tokio::test]
async fn restore_with_failing_refresh_clears_store() {
    let session = Session::new();
    session.client.set_refresh_error(OAuthClientError::Status(400));
    session.controller.store().store_tokens(&expiring_tokens(Some("r1"))).await.unwrap();
    session.clock.advance(Duration::from_secs(3_500));

    session.controller.restore_session().await;

    assert_eq!(session.controller.snapshot(), SessionState::idle());
    assert!(session.secrets.is_empty());
}

#[tokio::test]
async fn restore_with_rejected_profile_clears_store() {
    let session = Session::new();
    session.client.set_user_info_error(OAuthClientError::Status(401));
    session.controller.store().store_tokens(&expiring_tokens(Some("r1"))).await.unwrap();

    session.controller.restore_session().await;

    assert_eq!(session.controller.snapshot(), SessionState::idle());
    assert!(session.secrets.is_empty());
    assert_eq!(session.client.refresh_call_count(), 0);
}

/// Login through the browser.
///
/// # Test Steps
/// 1. Log in with the default scripted redirect
/// 2. Verify the browser saw an S256 authorization URL with a state
/// 3. Verify the session and the store hold the exchanged tokens
#[tokio::test]
async fn login_round_trip() {
    let session = Session::new();

    session.controller.login().await.unwrap();

    let opened = session.browser.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].contains("code_challenge_method=S256"));
    assert!(opened[0].contains("state="));

    let state = session.controller.snapshot();
    assert_eq!(state.status(), SessionStatus::Authenticated);
    assert_eq!(state.user.as_ref().map(|u| u.email.as_str()), Some("user@example.com"));
    assert_eq!(session.secrets.value("refresh_token").as_deref(), Some("mock_refresh_token"));
}

#[tokio::test]
async fn each_login_uses_a_fresh_challenge() {
    let session = Session::new();
    session.controller.login().await.unwrap();
    let first = session.client.last_challenge().unwrap();
    session.controller.logout().await;
    session.controller.login().await.unwrap();
    let second = session.client.last_challenge().unwrap();

    assert_ne!(first, second);
    let verifiers: Vec<_> =
        session.client.exchange_calls().into_iter().map(|(_, verifier)| verifier).collect();
    assert_ne!(verifiers[0], verifiers[1]);
}

#[tokio::test]
async fn cancelled_login_leaves_no_error() {
    let session = Session::new();
    session.browser.push(AuthorizationOutcome::Cancelled);

    assert_eq!(session.controller.login().await, Err(AuthError::UserCancelled));

    let state = session.controller.snapshot();
    assert_eq!(state.status(), SessionStatus::Idle);
    assert_eq!(state.error, None);
}

#[tokio::test]
async fn exchange_failure_reports_network_message() {
    let session = Session::new();
    session.client.set_exchange_error(OAuthClientError::Timeout);

    let err = session.controller.login().await.unwrap_err();

    assert!(matches!(err, AuthError::Network(_)));
    assert_eq!(
        session.controller.snapshot().error.as_deref(),
        Some("Unable to reach the sign-in service. Please check your connection and try again")
    );
    assert!(session.secrets.is_empty());
}

/// Manual refresh with no refresh token stored.
///
/// # Test Steps
/// 1. Log in with an exchange response that has no refresh token
/// 2. Request a refresh
/// 3. Verify the session is logged out and carries the expiry message
#[tokio::test]
async fn refresh_without_refresh_token_logs_out() {
    let session = Session::new();
    session.client.set_exchange_response(TokenSet::new("a1", None, None, 3600, "Bearer"));
    session.controller.login().await.unwrap();

    let err = session.controller.refresh_token().await.unwrap_err();

    assert!(matches!(err, AuthError::RefreshFailed(_)));
    let state = session.controller.snapshot();
    assert!(!state.is_authenticated);
    assert!(state.user.is_none());
    assert_eq!(state.error.as_deref(), Some("Your session has expired. Please log in again"));
    assert!(session.secrets.is_empty());
    assert_eq!(session.client.refresh_call_count(), 0);

    session.controller.clear_error();
    assert_eq!(session.controller.snapshot(), SessionState::idle());
}

/// Concurrent token reads share one refresh.
///
/// # Test Steps
/// 1. Log in and move the clock into the refresh buffer
/// 2. Slow the refresh down and request a valid token from many tasks
/// 3. Verify every task got the refreshed token from a single refresh call
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_token_reads_refresh_once() {
    let session = Session::new();
    session.controller.login().await.unwrap();
    session.clock.advance(Duration::from_secs(3_400));
    session.client.set_delay(Duration::from_millis(100));

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let controller = session.controller.clone();
        tasks.push(tokio::spawn(async move { controller.get_valid_access_token().await }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), Ok(Some("refreshed_access_token".to_string())));
    }

    assert_eq!(session.client.refresh_call_count(), 1);
    assert_eq!(
        session.controller.snapshot().access_token(),
        Some("refreshed_access_token")
    );
}

#[tokio::test]
async fn refresh_and_logout_run_in_order() {
    let session = Session::new();
    session.controller.login().await.unwrap();
    session.client.set_delay(Duration::from_millis(50));

    let (refreshed, ()) =
        tokio::join!(session.controller.refresh_token(), session.controller.logout());

    assert!(refreshed.is_ok());
    assert_eq!(session.controller.snapshot(), SessionState::idle());
}

#[tokio::test]
async fn subscribers_observe_transitions() {
    let session = Session::new();
    let mut rx = session.controller.subscribe();

    session.controller.restore_session().await;
    assert!(rx.has_changed().unwrap());
    assert_eq!(rx.borrow_and_update().status(), SessionStatus::Idle);

    session.controller.login().await.unwrap();
    assert!(rx.borrow_and_update().is_authenticated);
}
