//! Configuration loading.
//!
//! Credentials are read from environment variables; optional settings come
//! from a TOML configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Credentials, Result, REQUIRED_ENV_VARS};

/// Default configuration file content.
const DEFAULT_CONFIG: &str = r#"# Telegram Exporter Configuration
# Auto-generated - edit as needed.
# Credentials are NOT read from this file: set API_ID, API_HASH,
# PHONE_NUMBER and SESSION_NAME in the environment.

[export]
# Base directory for export runs
output_dir = "exports"

[download]
# Whether to download media attachments
enabled = true

# Per-file timeout in seconds (0 = no timeout)
timeout_secs = 300

# Skip files larger than this many megabytes (0 = unlimited)
max_file_size_mb = 0

# Longest file name written to disk, in bytes
max_filename_len = 120

[auth]
# Wrong verification codes tolerated before giving up
max_code_attempts = 3

[logging]
# Log file appended to on every run ("" disables file logging)
file = "telegram_export.log"
"#;

/// Read credentials from the process environment.
///
/// # Errors
/// Returns `Configuration` naming every missing variable, or an invalid `API_ID`.
pub fn load_credentials() -> Result<Credentials> {
    credentials_from(|key| std::env::var(key).ok())
}

/// Build credentials from an arbitrary variable lookup.
///
/// # Errors
/// Returns `Configuration` naming every missing variable, or an invalid `API_ID`.
pub fn credentials_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Credentials> {
    let read = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let missing: Vec<&str> = REQUIRED_ENV_VARS
        .iter()
        .copied()
        .filter(|&key| read(key).is_none())
        .collect();

    if !missing.is_empty() {
        return Err(AppError::config(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }

    let value = |key: &str| read(key).unwrap_or_default();
    let api_id = value("API_ID");

    let api_id = api_id
        .parse::<i32>()
        .map_err(|_| AppError::config(format!("API_ID must be an integer, got '{api_id}'")))?;

    Ok(Credentials {
        api_id,
        api_hash: value("API_HASH"),
        phone_number: value("PHONE_NUMBER"),
        session_name: value("SESSION_NAME"),
    })
}

/// Load configuration from `path`, or from the default location.
///
/// A missing file yields the defaults.
///
/// # Errors
/// Returns error if the file exists but cannot be read or parsed.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        load_config_from_file(&config_path)
    } else {
        if path.is_some() {
            return Err(AppError::config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
        Ok(AppConfig::default())
    }
}

/// Load configuration from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path).map_err(|e| AppError::fs(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AppError::config(format!("Failed to parse config file: {e}")))
}

/// Create default configuration file if it doesn't exist.
///
/// Returns the path and whether it was created.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(path: Option<&Path>) -> Result<(PathBuf, bool)> {
    let config_path = path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);

    if config_path.exists() {
        return Ok((config_path, false));
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).map_err(|e| AppError::fs(parent, e))?;
    }

    fs::write(&config_path, DEFAULT_CONFIG).map_err(|e| AppError::fs(&config_path, e))?;

    tracing::info!(path = %config_path.display(), "Created default configuration");
    Ok((config_path, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_credentials_complete() {
        let creds = credentials_from(env(&[
            ("API_ID", "12345"),
            ("API_HASH", "abcdef"),
            ("PHONE_NUMBER", "+15551234567"),
            ("SESSION_NAME", "me"),
        ]))
        .unwrap();

        assert_eq!(creds.api_id, 12345);
        assert_eq!(creds.api_hash, "abcdef");
        assert_eq!(creds.phone_number, "+15551234567");
        assert_eq!(creds.session_name, "me");
    }

    #[test]
    fn test_credentials_list_every_missing_key() {
        let err = credentials_from(env(&[("API_HASH", "abcdef"), ("SESSION_NAME", "  ")]))
            .unwrap_err()
            .to_string();

        assert!(err.contains("API_ID"));
        assert!(err.contains("PHONE_NUMBER"));
        assert!(err.contains("SESSION_NAME"));
        assert!(!err.contains("API_HASH"));
    }

    #[test]
    fn test_credentials_reject_non_numeric_id() {
        let err = credentials_from(env(&[
            ("API_ID", "abc"),
            ("API_HASH", "abcdef"),
            ("PHONE_NUMBER", "+1555"),
            ("SESSION_NAME", "me"),
        ]))
        .unwrap_err();

        assert!(matches!(err, AppError::Configuration { .. }));
    }

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.download.timeout_secs, 300);
        assert_eq!(config.auth.max_code_attempts, 3);
        assert_eq!(config.export.output_dir, PathBuf::from("exports"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: AppConfig = toml::from_str("[download]\nenabled = false\n").unwrap();
        assert!(!config.download.enabled);
        assert_eq!(config.download.max_filename_len, 120);
    }

    #[test]
    fn test_ensure_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.toml");

        let (created_path, created) = ensure_config_exists(Some(&path)).unwrap();
        assert!(created);
        assert_eq!(created_path, path);

        let (_, created_again) = ensure_config_exists(Some(&path)).unwrap();
        assert!(!created_again);

        let loaded = load_config(Some(&path)).unwrap();
        assert!(loaded.download.enabled);
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("absent.toml"))).is_err());
    }
}
