//! Shared test helpers for `authkeep-core` integration tests.
//!
//! Wires a [`SessionController`] over the in-memory doubles from
//! `authkeep_common::testing` and a scripted browser.

pub mod browser;

use std::sync::Arc;

use authkeep_common::auth::CredentialStore;
use authkeep_common::testing::{MockClock, MockOAuthClient, MockSecretStore};
use authkeep_core::SessionController;

pub use browser::ScriptedBrowser;

/// Controller plus handles on every double behind it
pub struct Session {
    pub controller: Arc<SessionController>,
    pub client: MockOAuthClient,
    pub secrets: MockSecretStore,
    pub clock: MockClock,
    pub browser: Arc<ScriptedBrowser>,
}

impl Session {
    pub fn new() -> Self {
        let client = MockOAuthClient::new();
        let secrets = MockSecretStore::new();
        let clock = MockClock::new();
        let browser = Arc::new(ScriptedBrowser::new(client.clone()));
        let store =
            Arc::new(CredentialStore::new(Arc::new(secrets.clone()), Arc::new(clock.clone())));
        let controller = Arc::new(SessionController::new(
            Arc::new(client.clone()),
            store,
            browser.clone(),
        ));

        Self { controller, client, secrets, clock, browser }
    }
}
