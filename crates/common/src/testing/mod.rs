//! Test doubles
//!
//! - [`MockSecretStore`]: in-memory secret backend with failure injection
//! - [`MockOAuthClient`]: scripted authorization server
//! - [`MockClock`]: wall clock that moves only when advanced
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for downstream crates' tests.

pub mod mocks;
pub mod time;

pub use mocks::{MockOAuthClient, MockSecretStore};
pub use time::MockClock;
