//! Configuration models.
//!
//! Credentials come from the environment only; everything else has a
//! default and may be overridden by the TOML config file.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

/// Environment variables that must be set before the exporter starts.
pub const REQUIRED_ENV_VARS: [&str; 4] = ["API_ID", "API_HASH", "PHONE_NUMBER", "SESSION_NAME"];

/// Telegram API credentials and session name.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Application id from my.telegram.org.
    pub api_id: i32,
    /// Application hash from my.telegram.org.
    pub api_hash: String,
    /// Account phone number, international format.
    pub phone_number: String,
    /// Name of the persisted session artifact.
    pub session_name: String,
}

impl Credentials {
    /// Path of the session artifact, relative to the working directory.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        PathBuf::from(format!("{}.session", self.session_name))
    }
}

// The API hash is a secret; keep it out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone_number", &self.phone_number)
            .field("session_name", &self.session_name)
            .finish()
    }
}

/// Export layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Base directory for export runs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("exports")
}

/// Media download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Whether to transfer media at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-file transfer timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Largest file to download in megabytes (0 = unlimited).
    #[serde(default)]
    pub max_file_size_mb: u64,

    /// Longest file name, in bytes, written to disk.
    #[serde(default = "default_max_filename_len")]
    pub max_filename_len: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            timeout_secs: default_timeout_secs(),
            max_file_size_mb: 0,
            max_filename_len: default_max_filename_len(),
        }
    }
}

impl DownloadConfig {
    /// Size limit in bytes, if any.
    #[must_use]
    pub const fn max_file_size_bytes(&self) -> Option<u64> {
        if self.max_file_size_mb == 0 {
            None
        } else {
            Some(self.max_file_size_mb * 1024 * 1024)
        }
    }
}

const fn default_enabled() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    300
}

const fn default_max_filename_len() -> usize {
    120
}

/// Sign-in settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Wrong verification codes tolerated before giving up.
    #[serde(default = "default_max_code_attempts")]
    pub max_code_attempts: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: default_max_code_attempts(),
        }
    }
}

const fn default_max_code_attempts() -> u32 {
    3
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file appended to on every run; `None` disables file logging.
    /// An empty string in the config file means `None`.
    #[serde(
        default = "default_log_file",
        deserialize_with = "empty_path_is_none",
        serialize_with = "none_as_empty_path"
    )]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
        }
    }
}

#[allow(clippy::unnecessary_wraps)]
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("telegram_export.log"))
}

fn empty_path_is_none<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<PathBuf>, D::Error> {
    let path = PathBuf::deserialize(deserializer)?;
    Ok(Some(path).filter(|p| !p.as_os_str().is_empty()))
}

#[allow(clippy::ref_option)]
fn none_as_empty_path<S: serde::Serializer>(
    path: &Option<PathBuf>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    path.clone().unwrap_or_default().serialize(serializer)
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub download: DownloadConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".telegram-exporter")
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.export.output_dir, PathBuf::from("exports"));
        assert!(config.download.enabled);
        assert_eq!(config.download.max_file_size_bytes(), None);
        assert_eq!(config.auth.max_code_attempts, 3);
    }

    #[test]
    fn test_empty_log_file_disables_file_logging() {
        let config: AppConfig = toml::from_str("[logging]\nfile = \"\"\n").unwrap();
        assert_eq!(config.logging.file, None);

        let config: AppConfig = toml::from_str("[logging]\nfile = \"run.log\"\n").unwrap();
        assert_eq!(config.logging.file, Some(PathBuf::from("run.log")));

        let config: AppConfig = toml::from_str("[logging]\n").unwrap();
        assert_eq!(config.logging.file, Some(PathBuf::from("telegram_export.log")));

        let disabled = AppConfig {
            logging: LoggingConfig { file: None },
            ..Default::default()
        };
        let reparsed: AppConfig = toml::from_str(&toml::to_string(&disabled).unwrap()).unwrap();
        assert_eq!(reparsed.logging.file, None);
    }

    #[test]
    fn test_size_limit() {
        let download = DownloadConfig {
            max_file_size_mb: 2,
            ..Default::default()
        };
        assert_eq!(download.max_file_size_bytes(), Some(2 * 1024 * 1024));
    }

    #[test]
    fn test_credentials_debug_hides_hash() {
        let creds = Credentials {
            api_id: 1,
            api_hash: "secret".into(),
            phone_number: "+1555".into(),
            session_name: "me".into(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
        assert_eq!(creds.session_file(), PathBuf::from("me.session"));
    }
}
