//! Conversions from lower-layer errors into domain errors.

use authkeep_common::auth::OAuthClientError;
use authkeep_common::security::KeychainError;
use authkeep_common::CommonError;
use authkeep_domain::AuthkeepError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub AuthkeepError);

impl From<InfraError> for AuthkeepError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AuthkeepError> for InfraError {
    fn from(value: AuthkeepError) -> Self {
        Self(value)
    }
}

trait IntoAuthkeepError {
    fn into_authkeep(self) -> AuthkeepError;
}

/* -------------------------------------------------------------------------- */
/* CommonError → AuthkeepError */
/* -------------------------------------------------------------------------- */

impl IntoAuthkeepError for CommonError {
    fn into_authkeep(self) -> AuthkeepError {
        let description = self.to_string();
        match self {
            Self::Config { .. } => AuthkeepError::Config(description),
            Self::Crypto { .. } => AuthkeepError::Security(description),
            Self::Persistence { .. } | Self::Serialization { .. } => {
                AuthkeepError::Storage(description)
            }
        }
    }
}

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        Self(value.into_authkeep())
    }
}

/* -------------------------------------------------------------------------- */
/* KeychainError → AuthkeepError */
/* -------------------------------------------------------------------------- */

impl IntoAuthkeepError for KeychainError {
    fn into_authkeep(self) -> AuthkeepError {
        match self {
            Self::AccessFailed(err) => {
                AuthkeepError::Storage(format!("unable to access secure storage: {err}"))
            }
            Self::NotFound => AuthkeepError::Storage("secret not found".into()),
            Self::Serialization(err) => {
                AuthkeepError::Storage(format!("stored secret is malformed: {err}"))
            }
            Self::Crypto(err) => AuthkeepError::Security(format!("secret decryption failed: {err}")),
        }
    }
}

impl From<KeychainError> for InfraError {
    fn from(value: KeychainError) -> Self {
        Self(value.into_authkeep())
    }
}

/* -------------------------------------------------------------------------- */
/* OAuthClientError → AuthkeepError */
/* -------------------------------------------------------------------------- */

impl IntoAuthkeepError for OAuthClientError {
    fn into_authkeep(self) -> AuthkeepError {
        let description = self.to_string();
        match self {
            Self::Transport(_) | Self::Timeout => AuthkeepError::Network(description),
            Self::Status(code) => match code {
                401 | 403 => AuthkeepError::Auth(description),
                400..=499 => AuthkeepError::InvalidInput(description),
                _ => AuthkeepError::Network(description),
            },
            Self::OAuth(_) | Self::NoRefreshToken => AuthkeepError::Auth(description),
            Self::Parse(_) => AuthkeepError::Internal(description),
            Self::Config(_) => AuthkeepError::Config(description),
        }
    }
}

impl From<OAuthClientError> for InfraError {
    fn from(value: OAuthClientError) -> Self {
        Self(value.into_authkeep())
    }
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → AuthkeepError */
/* -------------------------------------------------------------------------- */

impl IntoAuthkeepError for std::io::Error {
    fn into_authkeep(self) -> AuthkeepError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::AddrInUse | ErrorKind::AddrNotAvailable | ErrorKind::PermissionDenied => {
                AuthkeepError::Network(format!("cannot bind redirect listener: {self}"))
            }
            _ => AuthkeepError::Internal(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        Self(value.into_authkeep())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
