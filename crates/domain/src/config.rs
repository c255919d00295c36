//! Configuration structures
//!
//! Every section except `auth` can be omitted from a configuration file;
//! omitted fields fall back to the values in [`crate::constants`].

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_KEYCHAIN_SERVICE, DEFAULT_LOG_LEVEL, DEFAULT_REFRESH_BUFFER_SECONDS,
    DEFAULT_REQUEST_TIMEOUT_SECONDS, DEFAULT_SCOPES,
};
use crate::errors::{AuthkeepError, Result};
use crate::impl_config_enum_conversions;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Check the configuration for values that would only fail later at
    /// request time.
    pub fn validate(&self) -> Result<()> {
        self.auth.validate()?;
        self.storage.validate()?;
        Ok(())
    }
}

/// Authorization server and client registration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthConfig {
    pub client_id: String,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub userinfo_endpoint: String,
    pub redirect_uri: String,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    /// Additional query parameters for the authorization URL (`audience`,
    /// `prompt`, ...)
    #[serde(default)]
    pub extra_authorize_params: BTreeMap<String, String>,
    /// Lead time before expiry at which a token counts as expired
    #[serde(default = "default_refresh_buffer_seconds")]
    pub refresh_buffer_seconds: i64,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
    /// How long the browser hand-off may wait for a redirect. `None` waits
    /// until the user finishes or cancels.
    #[serde(default)]
    pub browser_timeout_seconds: Option<u64>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            authorization_endpoint: String::new(),
            token_endpoint: String::new(),
            userinfo_endpoint: String::new(),
            redirect_uri: String::new(),
            scopes: default_scopes(),
            extra_authorize_params: BTreeMap::new(),
            refresh_buffer_seconds: DEFAULT_REFRESH_BUFFER_SECONDS,
            request_timeout_seconds: DEFAULT_REQUEST_TIMEOUT_SECONDS,
            browser_timeout_seconds: None,
        }
    }
}

impl AuthConfig {
    fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(AuthkeepError::Config("auth.client_id must not be empty".to_string()));
        }

        for (name, value) in [
            ("auth.authorization_endpoint", &self.authorization_endpoint),
            ("auth.token_endpoint", &self.token_endpoint),
            ("auth.userinfo_endpoint", &self.userinfo_endpoint),
        ] {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                return Err(AuthkeepError::Config(format!(
                    "{name} must be an http(s) URL, got '{value}'"
                )));
            }
        }

        if self.redirect_uri.trim().is_empty() {
            return Err(AuthkeepError::Config("auth.redirect_uri must not be empty".to_string()));
        }

        if self.request_timeout_seconds == 0 {
            return Err(AuthkeepError::Config(
                "auth.request_timeout_seconds must be greater than zero".to_string(),
            ));
        }

        if self.refresh_buffer_seconds < 0 {
            return Err(AuthkeepError::Config(
                "auth.refresh_buffer_seconds must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Where the credential store keeps its entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Platform keychain (macOS Keychain, Windows Credential Manager, Secret
    /// Service)
    #[default]
    Keychain,
    /// AES-256-GCM encrypted file, for hosts without a keychain
    EncryptedFile,
}

impl_config_enum_conversions!(StorageBackend {
    Keychain => "keychain",
    EncryptedFile => "encrypted_file",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    /// File location for the encrypted file backend
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Base64-encoded 32-byte key for the encrypted file backend
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            keychain_service: default_keychain_service(),
            path: None,
            encryption_key: None,
        }
    }
}

impl StorageConfig {
    fn validate(&self) -> Result<()> {
        match self.backend {
            StorageBackend::Keychain => {
                if self.keychain_service.trim().is_empty() {
                    return Err(AuthkeepError::Config(
                        "storage.keychain_service must not be empty".to_string(),
                    ));
                }
            }
            StorageBackend::EncryptedFile => {
                if self.path.is_none() {
                    return Err(AuthkeepError::Config(
                        "storage.path is required for the encrypted_file backend".to_string(),
                    ));
                }
                if self.encryption_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
                    return Err(AuthkeepError::Config(
                        "storage.encryption_key is required for the encrypted_file backend"
                            .to_string(),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_config_enum_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), format: LogFormat::default() }
    }
}

fn default_scopes() -> Vec<String> {
    DEFAULT_SCOPES.iter().map(|scope| (*scope).to_string()).collect()
}

const fn default_refresh_buffer_seconds() -> i64 {
    DEFAULT_REFRESH_BUFFER_SECONDS
}

const fn default_request_timeout_seconds() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECONDS
}

fn default_keychain_service() -> String {
    DEFAULT_KEYCHAIN_SERVICE.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
