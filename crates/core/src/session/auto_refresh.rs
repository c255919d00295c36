//! Background token refresh
//!
//! Sleeps until the stored token enters the refresh buffer, then refreshes
//! through the controller. With nothing stored it re-checks every minute.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::service::SessionController;

/// Re-check interval while no token is stored
pub const IDLE_RECHECK_INTERVAL: Duration = Duration::from_secs(60);

/// Lower bound between two wake-ups, so a server issuing tokens shorter
/// than the buffer cannot spin the task
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

/// Handle to a running auto-refresh task. Dropping it stops the task.
#[derive(Debug)]
pub struct AutoRefreshHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl AutoRefreshHandle {
    /// Token that stops the task when cancelled
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                if err.is_panic() {
                    warn!(error = %err, "Auto-refresh task panicked");
                }
            }
        }
    }
}

impl Drop for AutoRefreshHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start refreshing `controller`'s tokens in the background
///
/// The task holds a weak reference, so it also ends once the controller is
/// dropped.
pub fn spawn_auto_refresh(controller: &Arc<SessionController>) -> AutoRefreshHandle {
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(Arc::downgrade(controller), cancel.clone()));
    info!("Started token auto-refresh task");
    AutoRefreshHandle { cancel, task: Some(task) }
}

async fn run(controller: Weak<SessionController>, cancel: CancellationToken) {
    let mut floor = Duration::ZERO;

    loop {
        let Some(wait) = next_wake(&controller).await else { break };
        let wait = wait.max(floor);
        debug!(seconds = wait.as_secs(), "Auto-refresh sleeping");

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(wait) => {}
        }

        let Some(session) = controller.upgrade() else { break };
        floor = Duration::ZERO;
        if !refresh_due(&session).await {
            continue;
        }

        floor = MIN_REFRESH_INTERVAL;
        if let Err(err) = session.refresh_token().await {
            warn!(error = %err, "Background refresh failed");
        }
    }

    info!("Token auto-refresh task stopped");
}

async fn next_wake(controller: &Weak<SessionController>) -> Option<Duration> {
    let session = controller.upgrade()?;
    let wait = match session.store().seconds_until_expiry().await {
        Some(seconds) => {
            let until_refresh = seconds.saturating_sub(session.refresh_buffer_seconds()).max(0);
            Duration::from_secs(until_refresh.unsigned_abs())
        }
        None => IDLE_RECHECK_INTERVAL,
    };
    Some(wait)
}

async fn refresh_due(session: &SessionController) -> bool {
    session
        .store()
        .seconds_until_expiry()
        .await
        .is_some_and(|seconds| seconds <= session.refresh_buffer_seconds())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use authkeep_common::auth::{CredentialStore, OAuthClientError, TokenSet};
    use authkeep_common::testing::{MockClock, MockOAuthClient, MockSecretStore};

    use super::*;
    use crate::session::ports::{AuthorizationBrowser, AuthorizationOutcome};

    struct NoBrowser;

    #[async_trait]
    impl AuthorizationBrowser for NoBrowser {
        async fn authorize(&self, _url: &str) -> AuthorizationOutcome {
            AuthorizationOutcome::Cancelled
        }
    }

    fn controller(client: &MockOAuthClient, clock: &MockClock) -> Arc<SessionController> {
        let store = Arc::new(CredentialStore::new(
            Arc::new(MockSecretStore::new()),
            Arc::new(clock.clone()),
        ));
        Arc::new(SessionController::new(Arc::new(client.clone()), store, Arc::new(NoBrowser)))
    }

    async fn wait_for(mut check: impl FnMut() -> bool) {
        for _ in 0..1_000 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        panic!("condition not reached");
    }

    #[tokio::test(start_paused = true)]
    async fn refreshes_when_buffer_is_reached() {
        let client = MockOAuthClient::new();
        let clock = MockClock::new();
        let controller = controller(&client, &clock);
        controller
            .store()
            .store_tokens(&TokenSet::new("a1", Some("r1".into()), None, 400, "Bearer"))
            .await
            .unwrap();
        assert_eq!(
            next_wake(&Arc::downgrade(&controller)).await,
            Some(Duration::from_secs(100))
        );

        clock.advance(Duration::from_secs(150));
        let handle = spawn_auto_refresh(&controller);
        wait_for(|| client.refresh_call_count() == 1).await;

        assert_eq!(client.refresh_calls(), vec!["r1".to_string()]);
        assert_eq!(
            controller.store().get_tokens().await.unwrap().unwrap().access_token,
            "refreshed_access_token"
        );

        // The mock clock is frozen, so the new token never enters the buffer.
        tokio::time::sleep(Duration::from_secs(7_200)).await;
        assert_eq!(client.refresh_call_count(), 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failed_refresh_ends_session() {
        let client = MockOAuthClient::new();
        client.set_refresh_error(OAuthClientError::Status(401));
        let clock = MockClock::new();
        let controller = controller(&client, &clock);
        controller
            .store()
            .store_tokens(&TokenSet::new("a1", Some("r1".into()), None, 60, "Bearer"))
            .await
            .unwrap();

        let handle = spawn_auto_refresh(&controller);
        wait_for(|| controller.snapshot().error.is_some()).await;

        assert!(controller.store().get_tokens().await.unwrap().is_none());
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some("Your session has expired. Please log in again")
        );
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn idle_store_rechecks_every_minute() {
        let controller = controller(&MockOAuthClient::new(), &MockClock::new());
        assert_eq!(next_wake(&Arc::downgrade(&controller)).await, Some(IDLE_RECHECK_INTERVAL));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_on_cancel_and_on_controller_drop() {
        let client = MockOAuthClient::new();
        let clock = MockClock::new();

        let controller = controller(&client, &clock);
        let handle = spawn_auto_refresh(&controller);
        handle.stop();
        wait_for(|| handle.is_finished()).await;

        let handle = spawn_auto_refresh(&controller);
        drop(controller);
        wait_for(|| handle.is_finished()).await;
        assert_eq!(client.refresh_call_count(), 0);
    }
}
