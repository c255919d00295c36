//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Loads a `.env` file from the working directory, if one exists
//! 2. Reads the file named by `AUTHKEEP_CONFIG`, or the first file found by
//!    [`probe_config_paths`], or starts from defaults when there is none
//! 3. Applies `AUTHKEEP_*` environment overrides
//! 4. Validates the result
//!
//! ## Environment Variables
//! - `AUTHKEEP_CONFIG`: Explicit config file path
//! - `AUTHKEEP_CLIENT_ID`: OAuth client id
//! - `AUTHKEEP_AUTHORIZATION_ENDPOINT`, `AUTHKEEP_TOKEN_ENDPOINT`,
//!   `AUTHKEEP_USERINFO_ENDPOINT`: Authorization server endpoints
//! - `AUTHKEEP_REDIRECT_URI`: Redirect URI registered for the client
//! - `AUTHKEEP_SCOPES`: Scopes, separated by spaces or commas
//! - `AUTHKEEP_REFRESH_BUFFER_SECONDS`: Seconds before expiry that count as
//!   expired
//! - `AUTHKEEP_REQUEST_TIMEOUT_SECONDS`: HTTP request timeout
//! - `AUTHKEEP_BROWSER_TIMEOUT_SECONDS`: Loopback callback timeout
//! - `AUTHKEEP_STORAGE_BACKEND`: `keychain` or `encrypted_file`
//! - `AUTHKEEP_STORAGE_PATH`: Encrypted file location
//! - `AUTHKEEP_STORAGE_KEY`: Base64 encryption key for the file backend
//! - `AUTHKEEP_LOG_LEVEL`, `AUTHKEEP_LOG_FORMAT`: Logging
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./authkeep.{toml,json}` and `./config.{toml,json}`
//! 2. The same names one and two directories up
//! 3. The same names next to the executable

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use authkeep_domain::{AuthkeepError, Config, Result};

const CONFIG_PATH_VAR: &str = "AUTHKEEP_CONFIG";
const CONFIG_FILE_NAMES: [&str; 4] =
    ["authkeep.toml", "authkeep.json", "config.toml", "config.json"];

/// Load configuration from `.env`, file and environment
///
/// # Errors
/// Returns `AuthkeepError::Config` if:
/// - An explicit config file is missing or malformed
/// - An environment override has an invalid value
/// - The merged configuration fails validation
pub fn load() -> Result<Config> {
    load_dotenv();

    let file = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from).or_else(probe_config_paths);
    let mut config = match file {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults and environment");
            Config::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(err) if err.not_found() => {}
        Err(err) => tracing::warn!(error = %err, "Failed to load .env file"),
    }
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension). No
/// environment overrides or validation are applied.
///
/// # Errors
/// Returns `AuthkeepError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
/// - Required fields are missing
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(AuthkeepError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            AuthkeepError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| AuthkeepError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| AuthkeepError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| AuthkeepError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(AuthkeepError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the standard locations
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        roots.push(exe_dir);
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

/// Apply `AUTHKEEP_*` environment variables on top of `config`
///
/// # Errors
/// Returns `AuthkeepError::Config` when a numeric or enum variable cannot be
/// parsed.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    apply_overrides(config, |key| std::env::var(key).ok())
}

fn apply_overrides(config: &mut Config, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let auth = &mut config.auth;

    if let Some(value) = var("AUTHKEEP_CLIENT_ID") {
        auth.client_id = value;
    }
    if let Some(value) = var("AUTHKEEP_AUTHORIZATION_ENDPOINT") {
        auth.authorization_endpoint = value;
    }
    if let Some(value) = var("AUTHKEEP_TOKEN_ENDPOINT") {
        auth.token_endpoint = value;
    }
    if let Some(value) = var("AUTHKEEP_USERINFO_ENDPOINT") {
        auth.userinfo_endpoint = value;
    }
    if let Some(value) = var("AUTHKEEP_REDIRECT_URI") {
        auth.redirect_uri = value;
    }
    if let Some(value) = var("AUTHKEEP_SCOPES") {
        auth.scopes = value
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|scope| !scope.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(value) = var("AUTHKEEP_REFRESH_BUFFER_SECONDS") {
        auth.refresh_buffer_seconds = parse_var("AUTHKEEP_REFRESH_BUFFER_SECONDS", &value)?;
    }
    if let Some(value) = var("AUTHKEEP_REQUEST_TIMEOUT_SECONDS") {
        auth.request_timeout_seconds = parse_var("AUTHKEEP_REQUEST_TIMEOUT_SECONDS", &value)?;
    }
    if let Some(value) = var("AUTHKEEP_BROWSER_TIMEOUT_SECONDS") {
        auth.browser_timeout_seconds = Some(parse_var("AUTHKEEP_BROWSER_TIMEOUT_SECONDS", &value)?);
    }

    let storage = &mut config.storage;
    if let Some(value) = var("AUTHKEEP_STORAGE_BACKEND") {
        storage.backend = parse_var("AUTHKEEP_STORAGE_BACKEND", &value)?;
    }
    if let Some(value) = var("AUTHKEEP_STORAGE_PATH") {
        storage.path = Some(PathBuf::from(value));
    }
    if let Some(value) = var("AUTHKEEP_STORAGE_KEY") {
        storage.encryption_key = Some(value);
    }

    let logging = &mut config.logging;
    if let Some(value) = var("AUTHKEEP_LOG_LEVEL") {
        logging.level = value;
    }
    if let Some(value) = var("AUTHKEEP_LOG_FORMAT") {
        logging.format = parse_var("AUTHKEEP_LOG_FORMAT", &value)?;
    }

    Ok(())
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    value.trim().parse().map_err(|e| AuthkeepError::Config(format!("Invalid {key}: {e}")))
}
