//! Infrastructure layer - external adapters (environment, filesystem, Telegram).
//!
//! This layer handles configuration sources and the live messaging client.

pub mod config;
#[cfg(feature = "telegram")]
pub mod telegram;

pub use config::{
    credentials_from, ensure_config_exists, load_config, load_config_from_file, load_credentials,
};
#[cfg(feature = "telegram")]
pub use telegram::{GrammersAuthenticator, TelegramClient, TelegramHistory};
