//! Default values
//!
//! Centralized location for the defaults applied when a configuration field
//! is omitted.

// Token lifecycle
pub const DEFAULT_REFRESH_BUFFER_SECONDS: i64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 30;

// Authorization request
pub const DEFAULT_SCOPES: &[&str] = &["openid", "profile", "email", "offline_access"];

// Secure storage
pub const DEFAULT_KEYCHAIN_SERVICE: &str = "authkeep";

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
