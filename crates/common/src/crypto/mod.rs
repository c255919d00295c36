//! Symmetric encryption used by the encrypted file secret store.

pub mod encryption;

pub use encryption::{EncryptedData, EncryptionService};
