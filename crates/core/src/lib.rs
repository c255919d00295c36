//! # Authkeep Core
//!
//! Session state machine for an OAuth 2.0 authorization code + PKCE client.
//!
//! This crate contains:
//! - The session controller and the snapshot it publishes
//! - The session error taxonomy and user-facing messages
//! - Port interfaces for the external authorization browser
//! - Background token refresh
//!
//! ## Architecture Principles
//! - Only depends on `authkeep-common`
//! - No HTTP server, config files or platform code
//! - The browser is reached through a trait

pub mod session;

pub use session::auto_refresh::{spawn_auto_refresh, AutoRefreshHandle};
pub use session::errors::AuthError;
pub use session::ports::{AuthorizationBrowser, AuthorizationOutcome};
pub use session::service::SessionController;
pub use session::state::{SessionState, SessionStatus};
