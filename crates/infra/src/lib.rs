//! # Authkeep Infrastructure
//!
//! Adapters and composition root for the session core.
//!
//! This crate contains:
//! - Configuration loading (files, `.env`, environment overrides)
//! - Tracing subscriber setup
//! - The loopback redirect browser adapter
//! - `build_session`, which wires configuration into a controller
//!
//! ## Architecture
//! - Implements ports defined in `authkeep-core`
//! - Depends on `authkeep-common`, `authkeep-domain` and `authkeep-core`
//! - Contains all "impure" code (sockets, files, process environment)

pub mod bootstrap;
pub mod browser;
pub mod config;
pub mod errors;
pub mod observability;

// Re-export commonly used items
pub use bootstrap::{build_session, oauth_config, secret_store, start_session};
pub use browser::LoopbackBrowser;
pub use errors::InfraError;
pub use observability::init_tracing;
