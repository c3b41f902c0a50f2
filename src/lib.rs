//! Telegram Exporter - export one Telegram conversation to a local directory.
//!
//! The pipeline resolves a conversation from a search query, walks its
//! history, downloads attachments into per-kind subdirectories and writes
//! `conversation.json` and `conversation.txt`.
//!
//! The core only depends on the traits in [`application::ports`]; the live
//! `grammers` adapter is behind the `telegram` feature.

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;

pub use application::{ExportOptions, ExportReport, ExportSession};
pub use domain::{AppError, Result};
