//! Export session and message export loop.
//!
//! An [`ExportSession`] owns the authenticated client for one run. It
//! enumerates dialogs once, resolves the query, prepares the output
//! directory and then walks the history newest-first, classifying each
//! message and downloading its media. Per-message and per-download
//! failures are recorded in the result instead of aborting the run.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Utc};

use crate::domain::{
    AppError, ConversationCandidate, Credentials, DownloadConfig, ExportResult, ExportSummary,
    MediaDescriptor, Message, MessageContent, Result,
};

use super::downloader::{DownloadOutcome, MediaDownloader};
use super::layout::{prepare_output_dir, write_artifacts};
use super::ports::{
    Authenticator, LoginPrompt, MessageHistory, MessagingClient, RemoteMedia, RemoteMessage,
};
use super::resolver::resolve;

const PROGRESS_EVERY: usize = 100;

/// Options for one export run.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Maximum number of messages to retrieve (`None` = whole history).
    pub limit: Option<usize>,
    /// Media download settings.
    pub download: DownloadConfig,
}

/// Where an export was written and what it contained.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub conversation: ConversationCandidate,
    pub output_dir: PathBuf,
    pub summary: ExportSummary,
}

/// State of one export run.
pub struct ExportSession<C: MessagingClient> {
    client: C,
    dialogs: Option<Vec<ConversationCandidate>>,
    conversation: Option<ConversationCandidate>,
    output_dir: Option<PathBuf>,
}

impl<C: MessagingClient> ExportSession<C> {
    /// Wrap an already authenticated client.
    #[must_use]
    pub const fn new(client: C) -> Self {
        Self {
            client,
            dialogs: None,
            conversation: None,
            output_dir: None,
        }
    }

    /// Authenticate and start a session.
    ///
    /// # Errors
    /// Returns `Authentication` or `Client` errors from the authenticator.
    pub async fn connect<A>(
        authenticator: &A,
        credentials: &Credentials,
        prompt: &dyn LoginPrompt,
    ) -> Result<Self>
    where
        A: Authenticator<Client = C>,
    {
        let client = authenticator.authenticate(credentials, prompt).await?;
        tracing::info!("Connected to Telegram");
        Ok(Self::new(client))
    }

    /// The account's dialogs. Fetched from the server on first call only.
    ///
    /// # Errors
    /// Returns error if the dialog list cannot be retrieved.
    pub async fn dialogs(&mut self) -> Result<&[ConversationCandidate]> {
        if self.dialogs.is_none() {
            let dialogs = self.client.dialogs().await?;
            tracing::info!(count = dialogs.len(), "Loaded dialogs");
            self.dialogs = Some(dialogs);
        }
        Ok(self.dialogs.as_deref().unwrap_or_default())
    }

    /// Resolve `query` against the dialog list and select that conversation.
    ///
    /// # Errors
    /// `NotFound` / `AmbiguousMatch` from the resolver, or a client error.
    pub async fn select(&mut self, query: &str) -> Result<ConversationCandidate> {
        tracing::info!(query, "Searching for conversation");
        let found = resolve(query, self.dialogs().await?)?.clone();
        self.conversation = Some(found.clone());
        Ok(found)
    }

    /// Create the export directory for the selected conversation.
    ///
    /// # Errors
    /// Returns `FileSystem` if the directory tree cannot be created.
    pub fn prepare_output(&mut self, base_dir: &Path, now: &DateTime<Local>) -> Result<PathBuf> {
        let conversation = self.selected()?;
        let dir = prepare_output_dir(base_dir, &conversation.export_name(), now)?;
        self.output_dir = Some(dir.clone());
        Ok(dir)
    }

    /// Run the export loop for the selected conversation.
    ///
    /// # Errors
    /// Only errors opening the history are fatal; later failures are
    /// recorded in the result.
    pub async fn export(&mut self, options: &ExportOptions) -> Result<ExportResult> {
        let conversation = self.selected()?.clone();
        let output_dir = self
            .output_dir
            .clone()
            .ok_or_else(|| AppError::config("Output directory not prepared"))?;

        export_messages(&mut self.client, &conversation, &output_dir, options).await
    }

    /// Resolve `query`, then export the conversation it names.
    ///
    /// # Errors
    /// Returns the first fatal error of any stage.
    pub async fn run(
        &mut self,
        query: &str,
        base_dir: &Path,
        options: &ExportOptions,
    ) -> Result<ExportReport> {
        self.select(query).await?;
        self.export_to(base_dir, options).await
    }

    /// Prepare the output directory, export the selected conversation and
    /// write the transcripts.
    ///
    /// # Errors
    /// Returns the first fatal error of any stage.
    pub async fn export_to(
        &mut self,
        base_dir: &Path,
        options: &ExportOptions,
    ) -> Result<ExportReport> {
        let conversation = self.selected()?.clone();
        let output_dir = self.prepare_output(base_dir, &Local::now())?;

        tracing::info!(name = %conversation.display_name, "Starting export");
        let result = self.export(options).await?;
        write_artifacts(&output_dir, &result)?;

        tracing::info!(
            "Export completed! {} messages exported to {}",
            result.summary.total_messages,
            output_dir.display()
        );

        Ok(ExportReport {
            conversation,
            output_dir,
            summary: result.summary,
        })
    }

    /// Borrow the underlying client.
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// Disconnect the client, ending the session.
    ///
    /// # Errors
    /// Returns error if the client fails to persist its session.
    pub async fn close(mut self) -> Result<()> {
        self.client.disconnect().await?;
        tracing::info!("Disconnected from Telegram");
        Ok(())
    }

    fn selected(&self) -> Result<&ConversationCandidate> {
        self.conversation
            .as_ref()
            .ok_or_else(|| AppError::config("No conversation selected"))
    }
}

/// Retrieves, classifies and downloads the history of `conversation`.
///
/// `limit` caps the number of history entries; `Some(0)` retrieves nothing.
///
/// # Errors
/// Returns error if the history cannot be opened.
pub async fn export_messages<C: MessagingClient>(
    client: &mut C,
    conversation: &ConversationCandidate,
    output_dir: &Path,
    options: &ExportOptions,
) -> Result<ExportResult> {
    let mut result = ExportResult {
        conversation: conversation.clone(),
        exported_at: Utc::now(),
        summary: ExportSummary::default(),
        messages: Vec::new(),
    };

    if options.limit == Some(0) {
        tracing::info!("Message limit is 0, nothing to retrieve");
        return Ok(result);
    }

    let mut history = client.history(conversation, options.limit).await?;
    let client: &C = client;
    let downloader = MediaDownloader::new(client, output_dir, &options.download);

    let mut retrieved = 0usize;
    let mut last_timestamp = result.exported_at;

    while options.limit.is_none_or(|limit| retrieved < limit) {
        let Some(entry) = history.next_message().await else {
            break;
        };
        retrieved += 1;

        let message = match entry {
            Ok(remote) => {
                last_timestamp = remote.timestamp;
                process_message(remote, &downloader, &options.download, &mut result.summary).await
            }
            Err(err) => {
                tracing::warn!("Failed to retrieve {}", err);
                result.summary.message_failures += 1;
                Message::failed(err.message_id.unwrap_or(0), last_timestamp, err.reason)
            }
        };
        result.messages.push(message);

        if retrieved % PROGRESS_EVERY == 0 {
            tracing::info!("Processed {} messages...", retrieved);
        }
    }

    result.normalize();

    tracing::info!(
        messages = result.summary.total_messages,
        media = result.summary.media_total(),
        failures = result.summary.failures(),
        "Export loop finished"
    );

    Ok(result)
}

async fn process_message<C: MessagingClient>(
    remote: RemoteMessage<C::Media>,
    downloader: &MediaDownloader<'_, C>,
    config: &DownloadConfig,
    summary: &mut ExportSummary,
) -> Message {
    let media = match &remote.media {
        Some(remote_media) => {
            summary.record_media(remote_media.kind);

            let mut descriptor = MediaDescriptor::new(remote_media.kind);
            descriptor.original_filename.clone_from(&remote_media.original_filename);
            descriptor.mime_type.clone_from(&remote_media.mime_type);
            descriptor.size_bytes = remote_media.size_bytes;

            if !remote_media.downloadable {
                tracing::debug!(
                    message_id = remote.id,
                    kind = %remote_media.kind,
                    "Attachment has no file, recording only"
                );
            } else if config.enabled {
                download_into(downloader, remote.id, remote_media, &mut descriptor, summary).await;
            }

            Some(descriptor)
        }
        None => None,
    };

    Message {
        id: remote.id,
        timestamp: remote.timestamp,
        sender_id: remote.sender_id,
        sender_name: remote.sender_name,
        outgoing: remote.outgoing,
        content: MessageContent::classify(&remote.text, media, remote.service_action),
        reply_to_id: remote.reply_to_id,
        forward_origin: remote.forward_origin,
        error: None,
    }
}

async fn download_into<C: MessagingClient>(
    downloader: &MediaDownloader<'_, C>,
    message_id: i32,
    remote_media: &RemoteMedia<C::Media>,
    descriptor: &mut MediaDescriptor,
    summary: &mut ExportSummary,
) {
    match downloader.download(message_id, remote_media).await {
        Ok(outcome) => {
            match &outcome {
                DownloadOutcome::Downloaded { .. } => summary.downloaded += 1,
                DownloadOutcome::AlreadyPresent { .. } => summary.skipped_existing += 1,
            }
            summary.downloaded_bytes += outcome.bytes();
            descriptor.mark_downloaded(outcome.local_path().to_string(), outcome.bytes());
        }
        Err(e) => {
            tracing::error!("Error downloading media for message {}: {}", message_id, e);
            summary.download_failures += 1;
            descriptor.mark_failed(e.to_string());
        }
    }
}
