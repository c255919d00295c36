//! Port interfaces for the authorization browser
//!
//! The controller hands the authorization URL to an [`AuthorizationBrowser`]
//! and suspends until the user finishes, dismisses, or the server reports an
//! error. Implementations live in infrastructure (loopback server, system
//! browser, in-app web view).

use async_trait::async_trait;
use url::Url;

/// How the authorization step ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationOutcome {
    /// Redirect carried an authorization code
    Completed { code: String, state: String },
    /// The user closed the browser
    Cancelled,
    /// Redirect carried an error, or the browser could not be driven
    Failed { error: String, description: Option<String> },
}

impl AuthorizationOutcome {
    /// Classify the redirect a browser was sent to
    ///
    /// `?code=..&state=..` completes; `?error=..&error_description=..` fails.
    /// A redirect with neither, or a string that is not a URL, fails with
    /// `invalid_request`.
    #[must_use]
    pub fn from_redirect_url(redirect: &str) -> Self {
        let Ok(url) = Url::parse(redirect) else {
            return Self::invalid("redirect is not a valid URL");
        };
        Self::from_query_pairs(url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())))
    }

    /// Classify already-decoded callback query parameters
    pub fn from_query_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut code = None;
        let mut state = None;
        let mut error = None;
        let mut description = None;

        for (key, value) in pairs {
            match key.as_str() {
                "code" => code = Some(value),
                "state" => state = Some(value),
                "error" => error = Some(value),
                "error_description" => description = Some(value),
                _ => {}
            }
        }

        if let Some(error) = error {
            return Self::Failed { error, description };
        }
        match code.filter(|code| !code.is_empty()) {
            Some(code) => Self::Completed { code, state: state.unwrap_or_default() },
            None => Self::invalid("redirect carried no authorization code"),
        }
    }

    fn invalid(description: &str) -> Self {
        Self::Failed {
            error: "invalid_request".to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// Opens the authorization URL and reports how the user left it
#[async_trait]
pub trait AuthorizationBrowser: Send + Sync {
    /// Present `url` and wait for the redirect back to the app
    async fn authorize(&self, url: &str) -> AuthorizationOutcome;
}
