//! Telegram Exporter - export one conversation with its media.
//!
//! Signs in with the credentials from the environment, finds the requested
//! conversation by username, phone number or name, and writes a JSON and a
//! plain-text transcript next to the downloaded attachments.
//!
//!   tg-export                           # Interactive export
//!   tg-export export -q @alice -l 500   # Non-interactive export
//!   tg-export dialogs                   # Test the connection
//!   tg-export init-config               # Write ~/.telegram-exporter/config.toml

use std::path::{Path, PathBuf};

use clap::Parser;
use colored::Colorize;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use telegram_exporter::application::{format_dialogs_table, format_summary};
use telegram_exporter::cli::{ask, prompt_limit, Cli, Commands, ConsolePrompt};
use telegram_exporter::domain::{AppConfig, AppError, Result};
use telegram_exporter::infrastructure::{
    ensure_config_exists, load_config, load_credentials, GrammersAuthenticator, TelegramClient,
};
use telegram_exporter::{ExportOptions, ExportReport, ExportSession};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    // The guard flushes the log file on drop.
    let _guard = setup_logging(cli.verbose, config.logging.file.as_deref());

    if let Err(e) = run(cli, config).await {
        tracing::error!("{}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Main application logic.
async fn run(cli: Cli, config: AppConfig) -> Result<()> {
    let config_path = cli.config.clone();

    match cli.command_or_default() {
        Commands::Export {
            query,
            limit,
            output_dir,
            no_media,
        } => cmd_export(&config, query, limit, output_dir, no_media).await,
        Commands::Dialogs { limit } => cmd_dialogs(&config, limit).await,
        Commands::InitConfig => cmd_init_config(config_path.as_deref()),
        Commands::Paths => {
            cmd_paths(&config, config_path.as_deref());
            Ok(())
        }
    }
}

/// Sign in, then resolve and export one conversation.
async fn cmd_export(
    config: &AppConfig,
    query: Option<String>,
    limit: Option<usize>,
    output_dir: Option<PathBuf>,
    no_media: bool,
) -> Result<()> {
    println!("{}", "Telegram Conversation Exporter".bold());
    println!("{}", "=".repeat(40));

    let credentials = load_credentials()?;

    let mut options = ExportOptions {
        limit,
        download: config.download.clone(),
    };
    if no_media {
        options.download.enabled = false;
    }
    let base_dir = output_dir.unwrap_or_else(|| config.export.output_dir.clone());

    let authenticator = GrammersAuthenticator::new(config.auth.max_code_attempts);
    let mut session = ExportSession::connect(&authenticator, &credentials, &ConsolePrompt).await?;

    let outcome = tokio::select! {
        outcome = export_interactive(&mut session, query, &base_dir, options) => outcome,
        _ = tokio::signal::ctrl_c() => Err(AppError::Interrupted),
    };

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close the session cleanly: {}", e);
    }

    match outcome? {
        Some(report) => print_report(&report),
        None => println!("No target specified. Exiting."),
    }

    Ok(())
}

/// Ask for whatever the command line did not give, then export.
///
/// Returns `None` when the user enters an empty target.
async fn export_interactive(
    session: &mut ExportSession<TelegramClient>,
    query: Option<String>,
    base_dir: &Path,
    mut options: ExportOptions,
) -> Result<Option<ExportReport>> {
    let interactive = query.is_none();
    session.dialogs().await?;

    let conversation = loop {
        let query = match &query {
            Some(query) => query.clone(),
            None => ask("Enter username, phone number, or name to export: ").await?,
        };
        if query.is_empty() {
            return Ok(None);
        }

        match session.select(&query).await {
            Ok(found) => break found,
            Err(e) if interactive && e.is_retryable_query() => {
                eprintln!("{} {}", "✗".red(), e);
            }
            Err(e) => return Err(e),
        }
    };

    println!("{} Found: {}", "✓".green(), conversation);

    if interactive && options.limit.is_none() {
        options.limit = prompt_limit().await?;
    }

    println!("\nStarting export...");
    session.export_to(base_dir, &options).await.map(Some)
}

fn print_report(report: &ExportReport) {
    println!();
    println!("{} Export completed!", "✓".green().bold());
    println!("  Conversation: {}", report.conversation);
    println!("  Saved to:     {}", report.output_dir.display());
    println!();
    println!("{}", format_summary(&report.summary));

    if report.summary.failures() > 0 {
        println!(
            "{} {} item(s) could not be exported; see the transcript for details.",
            "⚠".yellow(),
            report.summary.failures()
        );
    }
}

/// Connection test: sign in and list recent dialogs.
async fn cmd_dialogs(config: &AppConfig, limit: usize) -> Result<()> {
    let credentials = load_credentials()?;
    let authenticator = GrammersAuthenticator::new(config.auth.max_code_attempts);
    let mut session = ExportSession::connect(&authenticator, &credentials, &ConsolePrompt).await?;

    let listed = async {
        let account = session.client().account_label().await?;
        println!("{} Connected as {}", "✓".green().bold(), account.bold());
        println!();

        let dialogs = session.dialogs().await?;
        let shown = &dialogs[..dialogs.len().min(limit)];
        println!("{}", format_dialogs_table(shown));
        println!("Showing {} of {} conversation(s)", shown.len(), dialogs.len());
        Ok::<_, AppError>(())
    }
    .await;

    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close the session cleanly: {}", e);
    }

    listed
}

/// Write the default configuration file.
fn cmd_init_config(path: Option<&Path>) -> Result<()> {
    let (path, created) = ensure_config_exists(path)?;

    if created {
        println!("{} Created {}", "✓".green().bold(), path.display());
    } else {
        println!("Configuration already exists: {}", path.display());
    }

    Ok(())
}

/// Show where things are read from and written to.
fn cmd_paths(config: &AppConfig, config_path: Option<&Path>) {
    let config_path = config_path.map_or_else(AppConfig::default_config_path, Path::to_path_buf);
    let exists = |path: &Path| {
        if path.exists() {
            "found".green()
        } else {
            "missing".yellow()
        }
    };

    println!("{}", "📂 Telegram Exporter Paths".bold());
    println!();
    println!("  Config:  {} [{}]", config_path.display(), exists(&config_path));

    match std::env::var("SESSION_NAME") {
        Ok(name) if !name.trim().is_empty() => {
            let session = PathBuf::from(format!("{}.session", name.trim()));
            println!("  Session: {} [{}]", session.display(), exists(&session));
        }
        _ => println!("  Session: {}", "SESSION_NAME not set".yellow()),
    }

    println!("  Exports: {}", config.export.output_dir.display());
    match &config.logging.file {
        Some(file) => println!("  Log:     {}", file.display()),
        None => println!("  Log:     {}", "disabled".dimmed()),
    }
}

/// Console logging by verbosity, plus the log file when one is configured.
fn setup_logging(verbosity: u8, log_file: Option<&Path>) -> Option<WorkerGuard> {
    let (console, file) = match verbosity {
        0 => ("warn", "info"),
        1 => ("info", "info"),
        2 => ("debug", "debug"),
        _ => ("trace", "trace"),
    };

    let console_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(console));

    let (file_layer, guard) = match log_file.and_then(|path| Some((path, path.file_name()?))) {
        Some((path, name)) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(file));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .without_time()
                .with_filter(console_filter),
        )
        .with(file_layer)
        .init();

    guard
}
