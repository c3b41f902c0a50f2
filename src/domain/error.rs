//! Domain-level error types for the exporter.
//!
//! All errors are typed with `thiserror`. Fatal variants stop the pipeline;
//! `Download` and per-message failures are recorded in the export result
//! and counted instead of propagated.

use std::path::PathBuf;
use thiserror::Error;

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid configuration (environment or config file).
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Sign-in failed or was abandoned.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No dialog matched the search query.
    #[error("No conversation found for '{query}'")]
    NotFound { query: String },

    /// Several dialogs matched and none was preferred.
    #[error("'{query}' matches several conversations: {}", .matches.join(", "))]
    AmbiguousMatch { query: String, matches: Vec<String> },

    /// Output directory could not be prepared or written.
    #[error("File system error at {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A single media transfer failed.
    #[error("Download failed for message {message_id}: {reason}")]
    Download { message_id: i32, reason: String },

    /// The messaging client reported an error.
    #[error("Telegram client error: {message}")]
    Client { message: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// Reading interactive input failed.
    #[error("Input error: {message}")]
    Prompt { message: String },

    /// The run was cancelled by the user.
    #[error("Export interrupted")]
    Interrupted,
}

impl AppError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Authentication {
            message: message.into(),
        }
    }

    /// Create a client error from anything displayable.
    pub fn client(err: impl std::fmt::Display) -> Self {
        Self::Client {
            message: err.to_string(),
        }
    }

    /// Create a file system error for a path.
    pub fn fs(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source: err,
        }
    }

    /// Create a JSON error.
    pub fn json(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: Some(err),
        }
    }

    /// Whether the interactive flow may ask for another query after this error.
    #[must_use]
    pub const fn is_retryable_query(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::AmbiguousMatch { .. })
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ambiguous_lists_matches() {
        let err = AppError::AmbiguousMatch {
            query: "al".into(),
            matches: vec!["Alice".into(), "Alan".into()],
        };
        assert_eq!(
            err.to_string(),
            "'al' matches several conversations: Alice, Alan"
        );
        assert!(err.is_retryable_query());
    }

    #[test]
    fn test_fatal_errors_are_not_retryable() {
        assert!(!AppError::config("missing API_ID").is_retryable_query());
        assert!(!AppError::Interrupted.is_retryable_query());
    }
}
