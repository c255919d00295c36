//! Loopback redirect browser
//!
//! Serves the redirect URI on the loopback interface with axum, hands the
//! authorization URL to an application-supplied opener (system browser,
//! web view), and resolves on the first callback.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use authkeep_core::{AuthorizationBrowser, AuthorizationOutcome};
use authkeep_domain::{AuthConfig, AuthkeepError, Result};
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::InfraError;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Complete</title></head>
<body><h1>Authorization Successful</h1><p>You can close this window.</p></body>
</html>"#;

const FAILURE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization Failed</title></head>
<body><h1>Authorization Failed</h1><p>Return to the application and try again.</p></body>
</html>"#;

const STALE_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Authorization</title></head>
<body><p>This sign-in request has already been handled.</p></body>
</html>"#;

/// Opens the authorization URL somewhere the user can see it
pub type Opener = dyn Fn(&str) -> std::result::Result<(), String> + Send + Sync;

type CallbackSlot = Arc<Mutex<Option<oneshot::Sender<AuthorizationOutcome>>>>;

/// [`AuthorizationBrowser`] backed by a loopback HTTP listener
pub struct LoopbackBrowser {
    addr: SocketAddr,
    path: String,
    opener: Arc<Opener>,
    timeout: Option<Duration>,
    shutdown: CancellationToken,
    attempt: Mutex<CancellationToken>,
}

impl LoopbackBrowser {
    /// Listener for `redirect_uri`, which must be an `http` URL on a
    /// loopback address with an explicit port
    ///
    /// # Errors
    /// `AuthkeepError::Config` when the redirect URI cannot be served
    /// locally.
    pub fn new(
        redirect_uri: &str,
        opener: impl Fn(&str) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Result<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| AuthkeepError::Config(format!("Invalid redirect_uri: {e}")))?;
        if url.scheme() != "http" {
            return Err(AuthkeepError::Config(format!(
                "Loopback redirect must use http, got '{}'",
                url.scheme()
            )));
        }
        let port = url.port().ok_or_else(|| {
            AuthkeepError::Config("Loopback redirect_uri needs an explicit port".to_string())
        })?;
        let ip: IpAddr = match url.host_str() {
            Some("localhost") => [127, 0, 0, 1].into(),
            Some(host) => host
                .trim_start_matches('[')
                .trim_end_matches(']')
                .parse()
                .map_err(|_| {
                    AuthkeepError::Config(format!("Redirect host '{host}' is not a loopback address"))
                })?,
            None => return Err(AuthkeepError::Config("redirect_uri has no host".to_string())),
        };
        let addr = SocketAddr::new(ip, port);
        if !addr.ip().is_loopback() {
            return Err(AuthkeepError::Config(format!("{addr} is not a loopback address")));
        }

        let shutdown = CancellationToken::new();
        Ok(Self {
            addr,
            path: url.path().to_string(),
            opener: Arc::new(opener),
            timeout: None,
            attempt: Mutex::new(shutdown.child_token()),
            shutdown,
        })
    }

    /// Browser for `config.redirect_uri`, with the configured callback
    /// timeout
    ///
    /// # Errors
    /// As for [`new`](Self::new).
    pub fn from_config(
        config: &AuthConfig,
        opener: impl Fn(&str) -> std::result::Result<(), String> + Send + Sync + 'static,
    ) -> Result<Self> {
        let browser = Self::new(&config.redirect_uri, opener)?;
        Ok(match config.browser_timeout_seconds {
            Some(seconds) => browser.with_timeout(Duration::from_secs(seconds)),
            None => browser,
        })
    }

    /// Give up on a callback after `timeout`; reported as a failure
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Token that cancels the current and every future attempt
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Cancel the attempt in progress, as if the user closed the browser
    pub fn cancel(&self) {
        self.attempt.lock().cancel();
    }

    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    fn begin_attempt(&self) -> CancellationToken {
        let token = self.shutdown.child_token();
        *self.attempt.lock() = token.clone();
        token
    }

    async fn run(&self, url: &str) -> std::result::Result<AuthorizationOutcome, InfraError> {
        let cancel = self.begin_attempt();
        if cancel.is_cancelled() {
            return Ok(AuthorizationOutcome::Cancelled);
        }

        let listener = TcpListener::bind(self.addr).await?;
        let (tx, rx) = oneshot::channel();
        let slot: CallbackSlot = Arc::new(Mutex::new(Some(tx)));
        let app = Router::new().route(&self.path, get(handle_callback)).with_state(slot);

        let server_stop = CancellationToken::new();
        let stop = server_stop.clone();
        let server = tokio::spawn(async move {
            if let Err(err) =
                axum::serve(listener, app).with_graceful_shutdown(stop.cancelled_owned()).await
            {
                error!(error = %err, "Redirect listener failed");
            }
        });
        debug!(addr = %self.addr, path = %self.path, "Redirect listener started");

        let outcome = match (self.opener)(url) {
            Ok(()) => self.wait(rx, &cancel).await,
            Err(err) => {
                warn!(error = %err, "Failed to open authorization URL");
                AuthorizationOutcome::Failed {
                    error: "browser_unavailable".to_string(),
                    description: Some(err),
                }
            }
        };

        server_stop.cancel();
        if let Err(err) = server.await {
            if err.is_panic() {
                error!(error = %err, "Redirect listener panicked");
            }
        }
        Ok(outcome)
    }

    async fn wait(
        &self,
        rx: oneshot::Receiver<AuthorizationOutcome>,
        cancel: &CancellationToken,
    ) -> AuthorizationOutcome {
        let callback = async {
            rx.await.unwrap_or_else(|_| AuthorizationOutcome::Failed {
                error: "server_error".to_string(),
                description: Some("redirect listener stopped".to_string()),
            })
        };
        let deadline = async {
            match self.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            outcome = callback => outcome,
            () = cancel.cancelled() => {
                info!("Authorization cancelled");
                AuthorizationOutcome::Cancelled
            }
            () = deadline => {
                warn!(timeout_secs = ?self.timeout.map(|t| t.as_secs()), "Timed out waiting for redirect");
                AuthorizationOutcome::Failed {
                    error: "timeout".to_string(),
                    description: Some("no redirect received before the timeout".to_string()),
                }
            }
        }
    }
}

#[async_trait]
impl AuthorizationBrowser for LoopbackBrowser {
    async fn authorize(&self, url: &str) -> AuthorizationOutcome {
        match self.run(url).await {
            Ok(outcome) => outcome,
            Err(InfraError(err)) => {
                warn!(error = %err, "Redirect listener unavailable");
                AuthorizationOutcome::Failed {
                    error: "browser_unavailable".to_string(),
                    description: Some(err.to_string()),
                }
            }
        }
    }
}

async fn handle_callback(
    State(slot): State<CallbackSlot>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let Some(tx) = slot.lock().take() else {
        return Html(STALE_PAGE);
    };

    let outcome = AuthorizationOutcome::from_query_pairs(params);
    let page = match outcome {
        AuthorizationOutcome::Completed { .. } => SUCCESS_PAGE,
        _ => FAILURE_PAGE,
    };
    let _ = tx.send(outcome);
    Html(page)
}
