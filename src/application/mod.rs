//! Application layer - use cases and orchestration.
//!
//! This layer contains the export pipeline: conversation search, the
//! message export loop, media downloads and transcript formatting. It
//! reaches Telegram only through the traits in [`ports`].

pub mod downloader;
pub mod exporter;
pub mod formatter;
pub mod layout;
pub mod ports;
pub mod resolver;

pub use downloader::{destination_name, sanitize_filename, DownloadOutcome, MediaDownloader};
pub use exporter::{export_messages, ExportOptions, ExportReport, ExportSession};
pub use formatter::{
    format_bytes, format_dialogs_table, format_summary, parse_json, serialize_json,
    serialize_text,
};
pub use layout::{
    prepare_output_dir, sanitize_dir_name, write_artifacts, JSON_FILE, MEDIA_SUBDIRECTORIES,
    TEXT_FILE,
};
pub use ports::{
    Authenticator, FetchError, LoginPrompt, MessageHistory, MessagingClient, RemoteMedia,
    RemoteMessage,
};
pub use resolver::{normalize_phone, resolve};
