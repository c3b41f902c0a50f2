//! CLI interface using clap, plus the console prompts used by the
//! interactive export flow.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use async_trait::async_trait;
use clap::{Parser, Subcommand};

use crate::application::LoginPrompt;
use crate::domain::{AppError, Result};

/// Telegram Exporter - export a conversation with its media to JSON and text.
///
/// Credentials are read from API_ID, API_HASH, PHONE_NUMBER and SESSION_NAME.
/// Run without arguments for the interactive export.
#[derive(Parser, Debug)]
#[command(name = "tg-export")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Configuration file (default: ~/.telegram-exporter/config.toml).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export one conversation (prompts for anything not given).
    Export {
        /// Username, phone number or name of the conversation.
        #[arg(short, long)]
        query: Option<String>,

        /// Maximum number of messages to export (0 exports nothing).
        #[arg(short, long)]
        limit: Option<usize>,

        /// Base directory for the export.
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Record attachments without downloading them.
        #[arg(long)]
        no_media: bool,
    },

    /// Test the connection and list recent conversations.
    Dialogs {
        /// Number of dialogs to show.
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Write the default configuration file if it does not exist.
    InitConfig,

    /// Show configuration, session and export paths.
    Paths,
}

impl Cli {
    /// The command to run; interactive export when none was given.
    #[must_use]
    pub fn command_or_default(self) -> Commands {
        self.command.unwrap_or(Commands::Export {
            query: None,
            limit: None,
            output_dir: None,
            no_media: false,
        })
    }
}

/// Print `prompt` and read one trimmed line from stdin.
///
/// # Errors
/// Returns `Prompt` if stdin is closed or unreadable.
pub fn read_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush().map_err(|e| AppError::Prompt {
        message: e.to_string(),
    })?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Prompt {
            message: e.to_string(),
        })?;

    if read == 0 {
        return Err(AppError::Prompt {
            message: "stdin closed".into(),
        });
    }

    Ok(line.trim().to_string())
}

/// [`read_line`] on the blocking pool, so the caller stays cancellable.
///
/// # Errors
/// Returns `Prompt` if stdin is closed or unreadable.
pub async fn ask(prompt: impl Into<String>) -> Result<String> {
    let prompt = prompt.into();
    tokio::task::spawn_blocking(move || read_line(&prompt))
        .await
        .map_err(|e| AppError::Prompt {
            message: e.to_string(),
        })?
}

/// Parse the message limit prompt: empty means unbounded.
pub fn parse_limit(input: &str) -> std::result::Result<Option<usize>, String> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    input
        .parse::<usize>()
        .map(Some)
        .map_err(|_| format!("'{input}' is not a number"))
}

/// Ask for a message limit until the answer is valid.
///
/// # Errors
/// Returns `Prompt` if stdin is closed.
pub async fn prompt_limit() -> Result<Option<usize>> {
    loop {
        let input = ask("Enter message limit (press Enter for all messages): ").await?;
        match parse_limit(&input) {
            Ok(limit) => return Ok(limit),
            Err(msg) => eprintln!("{msg}"),
        }
    }
}

/// Sign-in prompts on the terminal.
pub struct ConsolePrompt;

#[async_trait]
impl LoginPrompt for ConsolePrompt {
    async fn verification_code(&self, phone: &str) -> Result<String> {
        ask(format!("Enter the code sent to {phone}: ")).await
    }

    async fn password(&self, hint: Option<&str>) -> Result<String> {
        let prompt = match hint {
            Some(hint) => format!("Enter your two-step verification password (hint: {hint}): "),
            None => "Enter your two-step verification password: ".to_string(),
        };
        ask(prompt).await
    }
}
