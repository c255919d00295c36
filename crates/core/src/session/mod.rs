//! Authentication session
//!
//! [`SessionController`](service::SessionController) drives login, logout,
//! startup restoration and refresh, and publishes a [`SessionState`]
//! snapshot through a `tokio::sync::watch` channel. The UI only reads
//! snapshots and calls controller operations.
//!
//! ```text
//!            login ok / restore ok
//!   Loading ───────────────────────▶ Authenticated
//!      │  ▲                              │
//!      │  │ login / logout               │ refresh failure
//!      ▼  │                              ▼
//!    Idle ◀──── clear_error ──────── Error(message)
//! ```

pub mod auto_refresh;
pub mod errors;
pub mod ports;
pub mod service;
pub mod state;

pub use auto_refresh::{spawn_auto_refresh, AutoRefreshHandle};
pub use errors::AuthError;
pub use ports::{AuthorizationBrowser, AuthorizationOutcome};
pub use service::SessionController;
pub use state::{SessionState, SessionStatus};
