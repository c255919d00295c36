//! Composition root
//!
//! Turns a validated [`Config`] into a [`SessionController`]: OAuth client
//! settings, the configured secret backend, the credential store and the
//! refresh buffer.

use std::sync::Arc;
use std::time::Duration;

use authkeep_common::auth::{CredentialStore, OAuthClient, OAuthConfig};
use authkeep_common::crypto::EncryptionService;
use authkeep_common::security::{EncryptedFileStore, KeychainProvider, SecretStore};
use authkeep_common::time::SystemClock;
use authkeep_core::{AuthorizationBrowser, SessionController};
use authkeep_domain::{AuthConfig, AuthkeepError, Config, Result, StorageBackend, StorageConfig};
use tracing::info;

use crate::errors::InfraError;

/// OAuth client settings for `auth`
#[must_use]
pub fn oauth_config(auth: &AuthConfig) -> OAuthConfig {
    auth.extra_authorize_params.iter().fold(
        OAuthConfig::new(
            auth.client_id.clone(),
            auth.authorization_endpoint.clone(),
            auth.token_endpoint.clone(),
            auth.userinfo_endpoint.clone(),
            auth.redirect_uri.clone(),
        )
        .with_scopes(auth.scopes.clone())
        .with_request_timeout(Duration::from_secs(auth.request_timeout_seconds)),
        |config, (key, value)| config.with_authorize_param(key.clone(), value.clone()),
    )
}

/// Secret backend selected by `storage.backend`
///
/// # Errors
/// `AuthkeepError::Config` when the encrypted file backend has no path or
/// an invalid key.
pub fn secret_store(storage: &StorageConfig) -> Result<Arc<dyn SecretStore>> {
    match storage.backend {
        StorageBackend::Keychain => {
            info!(service = %storage.keychain_service, "Using platform keychain for credentials");
            Ok(Arc::new(KeychainProvider::new(storage.keychain_service.clone())))
        }
        StorageBackend::EncryptedFile => {
            let path = storage.path.clone().ok_or_else(|| {
                AuthkeepError::Config("storage.path is required for encrypted_file".to_string())
            })?;
            let key = storage.encryption_key.as_deref().ok_or_else(|| {
                AuthkeepError::Config(
                    "storage.encryption_key is required for encrypted_file".to_string(),
                )
            })?;
            let cipher = EncryptionService::from_base64_key(key).map_err(InfraError::from)?;
            info!(
                path = %path.display(),
                key = %cipher.key_fingerprint(),
                "Using encrypted file for credentials"
            );
            Ok(Arc::new(EncryptedFileStore::new(path, cipher)))
        }
    }
}

/// Wire a controller from configuration
///
/// The controller starts in the loading state; call
/// [`SessionController::restore_session`] (or use [`start_session`]) before
/// presenting any UI.
///
/// # Errors
/// `AuthkeepError::Config` when validation fails or the storage backend
/// cannot be built, `AuthkeepError::Network` when the HTTP client cannot be
/// created.
pub fn build_session(
    config: &Config,
    browser: Arc<dyn AuthorizationBrowser>,
) -> Result<Arc<SessionController>> {
    config.validate()?;

    let client = OAuthClient::new(oauth_config(&config.auth)).map_err(InfraError::from)?;
    let store = Arc::new(CredentialStore::new(secret_store(&config.storage)?, Arc::new(SystemClock)));

    let controller = SessionController::new(Arc::new(client), store, browser)
        .with_refresh_buffer(config.auth.refresh_buffer_seconds);

    info!(
        client_id = %config.auth.client_id,
        backend = %config.storage.backend,
        refresh_buffer_seconds = config.auth.refresh_buffer_seconds,
        "Session controller ready"
    );
    Ok(Arc::new(controller))
}

/// [`build_session`] followed by startup restoration
///
/// # Errors
/// As for [`build_session`]. Restoration itself never fails.
pub async fn start_session(
    config: &Config,
    browser: Arc<dyn AuthorizationBrowser>,
) -> Result<Arc<SessionController>> {
    let controller = build_session(config, browser)?;
    controller.restore_session().await;
    Ok(controller)
}
