//! Domain layer - core types and errors.
//!
//! This layer contains pure domain models and error types
//! without any external dependencies (network, IO, etc.).

pub mod config;
pub mod error;
pub mod models;

pub use config::{
    AppConfig, AuthConfig, Credentials, DownloadConfig, ExportConfig, LoggingConfig,
    REQUIRED_ENV_VARS,
};
pub use error::{AppError, Result};
pub use models::{
    ConversationCandidate, ConversationKind, ExportResult, ExportSummary, ForwardOrigin,
    MediaDescriptor, MediaKind, Message, MessageContent,
};
