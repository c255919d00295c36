//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;

use authkeep_domain::{LogFormat, StorageBackend};
use authkeep_infra::config;
use tempfile::NamedTempFile;

fn write_config(contents: &str, extension: &str) -> (NamedTempFile, std::path::PathBuf) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    let path = temp_file.path().with_extension(extension);
    std::fs::copy(temp_file.path(), &path).expect("Failed to copy file");
    (temp_file, path)
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "auth": {
            "client_id": "desktop-app",
            "authorization_endpoint": "https://login.example.com/authorize",
            "token_endpoint": "https://login.example.com/oauth/token",
            "userinfo_endpoint": "https://login.example.com/userinfo",
            "redirect_uri": "http://127.0.0.1:8765/callback",
            "scopes": ["openid", "email"],
            "refresh_buffer_seconds": 600
        },
        "storage": {
            "backend": "encrypted_file",
            "path": "/tmp/authkeep/tokens.json",
            "encryption_key": "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA="
        },
        "logging": {
            "level": "authkeep=debug",
            "format": "json"
        }
    }"#;
    let (_temp, path) = write_config(json_content, "json");

    let config = config::load_from_file(Some(path.clone())).expect("JSON config should load");

    assert_eq!(config.auth.client_id, "desktop-app");
    assert_eq!(config.auth.scopes, vec!["openid", "email"]);
    assert_eq!(config.auth.refresh_buffer_seconds, 600);
    assert_eq!(config.auth.request_timeout_seconds, 30);
    assert_eq!(config.storage.backend, StorageBackend::EncryptedFile);
    assert_eq!(config.logging.format, LogFormat::Json);
    assert!(config.validate().is_ok());

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_with_minimal_fields() {
    let toml_content = r#"
[auth]
client_id = "cli"
authorization_endpoint = "https://id.example.com/authorize"
token_endpoint = "https://id.example.com/token"
userinfo_endpoint = "https://id.example.com/userinfo"
redirect_uri = "http://localhost:9000/"
"#;
    let (_temp, path) = write_config(toml_content, "toml");

    let config = config::load_from_file(Some(path.clone())).expect("TOML config should load");

    assert_eq!(config.auth.scopes, vec!["openid", "profile", "email", "offline_access"]);
    assert_eq!(config.auth.refresh_buffer_seconds, 300);
    assert_eq!(config.auth.browser_timeout_seconds, None);
    assert_eq!(config.storage.backend, StorageBackend::Keychain);
    assert_eq!(config.storage.keychain_service, "authkeep");
    assert_eq!(config.logging.level, "info");

    std::fs::remove_file(path).ok();
}

#[test]
fn test_load_config_invalid_toml() {
    let (_temp, path) = write_config("[auth\nclient_id = ", "toml");

    let err = config::load_from_file(Some(path.clone())).unwrap_err();
    assert!(err.to_string().contains("Invalid TOML format"));

    std::fs::remove_file(path).ok();
}
