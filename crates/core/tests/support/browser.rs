use std::collections::VecDeque;

use async_trait::async_trait;
use authkeep_common::testing::MockOAuthClient;
use authkeep_core::{AuthorizationBrowser, AuthorizationOutcome};
use parking_lot::Mutex;

/// Browser double that plays back queued outcomes.
///
/// With an empty queue it completes with code `test-code` and echoes the
/// `state` from the last authorization URL the client built.
pub struct ScriptedBrowser {
    client: MockOAuthClient,
    outcomes: Mutex<VecDeque<AuthorizationOutcome>>,
    opened: Mutex<Vec<String>>,
}

impl ScriptedBrowser {
    pub fn new(client: MockOAuthClient) -> Self {
        Self { client, outcomes: Mutex::new(VecDeque::new()), opened: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, outcome: AuthorizationOutcome) {
        self.outcomes.lock().push_back(outcome);
    }

    /// URLs handed to the browser so far
    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl AuthorizationBrowser for ScriptedBrowser {
    async fn authorize(&self, url: &str) -> AuthorizationOutcome {
        self.opened.lock().push(url.to_string());
        if let Some(outcome) = self.outcomes.lock().pop_front() {
            return outcome;
        }
        let (state, _) = self.client.last_challenge().unwrap_or_default();
        AuthorizationOutcome::Completed { code: "test-code".to_string(), state }
    }
}
