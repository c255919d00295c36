//! # Authkeep Domain
//!
//! Configuration structures, defaults and the workspace-level error type.
//!
//! This crate contains:
//! - Configuration structures (`Config`, `AuthConfig`, `StorageConfig`,
//!   `LoggingConfig`)
//! - Domain error types and Result definitions
//! - Default values shared by the session core and the loader
//!
//! ## Architecture
//! - No dependencies on other Authkeep crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
