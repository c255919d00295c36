//! Common error type for the crypto and serialization helpers
//!
//! Module-specific errors (`OAuthClientError`, `KeychainError`,
//! `CredentialStoreError`, ...) live next to the code that raises them and
//! compose with [`CommonError`] where they wrap these helpers.

use thiserror::Error;

/// Result alias for the helpers in this crate
pub type CommonResult<T> = Result<T, CommonError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommonError {
    /// Configuration-related errors
    #[error("Configuration error{}: {message}", field.as_ref().map(|f| format!(" in field '{f}'")).unwrap_or_default())]
    Config { message: String, field: Option<String> },

    /// Serialization or deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Data persistence errors (file I/O)
    #[error("Persistence error{}: {message}", operation.as_ref().map(|op| format!(" during {op}")).unwrap_or_default())]
    Persistence { message: String, operation: Option<String> },

    /// Encryption, decryption or key material errors
    #[error("Crypto error: {message}")]
    Crypto { message: String },
}

impl CommonError {
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    pub fn config_field<S: Into<String>, F: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization { message: message.into() }
    }

    pub fn persistence<S: Into<String>, O: Into<String>>(operation: O, message: S) -> Self {
        Self::Persistence { message: message.into(), operation: Some(operation.into()) }
    }

    pub fn crypto<S: Into<String>>(message: S) -> Self {
        Self::Crypto { message: message.into() }
    }
}

impl From<serde_json::Error> for CommonError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string())
    }
}

impl From<std::io::Error> for CommonError {
    fn from(err: std::io::Error) -> Self {
        Self::Persistence { message: err.to_string(), operation: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_optional_context() {
        assert_eq!(
            CommonError::config_field("storage.path", "missing").to_string(),
            "Configuration error in field 'storage.path': missing"
        );
        assert_eq!(CommonError::config("missing").to_string(), "Configuration error: missing");
        assert_eq!(
            CommonError::persistence("rename", "denied").to_string(),
            "Persistence error during rename: denied"
        );
    }

    #[test]
    fn serde_json_errors_convert_to_serialization() {
        let err: CommonError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, CommonError::Serialization { .. }));
    }
}
