//! Media downloader.
//!
//! Files land in `{output_dir}/{subdir}/{message_id}_{name}`. A non-empty
//! file already at that path is reused, so re-running an interrupted
//! export does not transfer it again.

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::{AppError, DownloadConfig, MediaKind, Result};

use super::ports::{MessagingClient, RemoteMedia};

/// Longest extension kept intact when a file name is shortened.
const MAX_EXTENSION_LEN: usize = 16;

/// What happened to one attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Transferred in this run.
    Downloaded { local_path: String, bytes: u64 },
    /// A previous run already wrote it.
    AlreadyPresent { local_path: String, bytes: u64 },
}

impl DownloadOutcome {
    /// Path relative to the export directory.
    #[must_use]
    pub fn local_path(&self) -> &str {
        match self {
            Self::Downloaded { local_path, .. } | Self::AlreadyPresent { local_path, .. } => {
                local_path
            }
        }
    }

    /// Size on disk.
    #[must_use]
    pub const fn bytes(&self) -> u64 {
        match self {
            Self::Downloaded { bytes, .. } | Self::AlreadyPresent { bytes, .. } => *bytes,
        }
    }
}

/// Writes attachments into an export directory.
pub struct MediaDownloader<'a, C: MessagingClient> {
    client: &'a C,
    output_dir: &'a Path,
    config: &'a DownloadConfig,
}

impl<'a, C: MessagingClient> MediaDownloader<'a, C> {
    /// Create a downloader for one export directory.
    #[must_use]
    pub const fn new(client: &'a C, output_dir: &'a Path, config: &'a DownloadConfig) -> Self {
        Self {
            client,
            output_dir,
            config,
        }
    }

    /// Downloads one attachment unless it is already on disk.
    ///
    /// # Errors
    /// Returns `Download` for size limit violations, timeouts, transport
    /// failures and empty transfers, or `FileSystem` if the file cannot be
    /// moved into place.
    pub async fn download(
        &self,
        message_id: i32,
        media: &RemoteMedia<C::Media>,
    ) -> Result<DownloadOutcome> {
        let fail = |reason: String| AppError::Download { message_id, reason };

        if let (Some(limit), Some(size)) = (self.config.max_file_size_bytes(), media.size_bytes) {
            if size > limit {
                return Err(fail(format!("{size} bytes exceeds the {limit} byte limit")));
            }
        }

        let file_name = destination_name(
            message_id,
            media.kind,
            media.original_filename.as_deref(),
            self.config.max_filename_len,
        );
        let subdir = media.kind.subdirectory();
        let local_path = format!("{subdir}/{file_name}");
        let dir = self.output_dir.join(subdir);
        let dest = dir.join(&file_name);

        if let Some(bytes) = existing_size(&dest).await {
            tracing::debug!(path = %dest.display(), "Already downloaded, skipping");
            return Ok(DownloadOutcome::AlreadyPresent { local_path, bytes });
        }

        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::fs(&dir, e))?;

        let part = partial_path(&dest);
        tracing::info!(kind = %media.kind, file = %file_name, "Downloading");

        let transfer = self.client.download(&media.handle, &part);
        let outcome = if self.config.timeout_secs == 0 {
            transfer.await
        } else {
            match tokio::time::timeout(Duration::from_secs(self.config.timeout_secs), transfer).await
            {
                Ok(outcome) => outcome,
                Err(_) => {
                    discard(&part).await;
                    return Err(fail(format!(
                        "timed out after {}s",
                        self.config.timeout_secs
                    )));
                }
            }
        };

        if let Err(e) = outcome {
            discard(&part).await;
            return Err(fail(e.to_string()));
        }

        let bytes = match tokio::fs::metadata(&part).await {
            Ok(meta) if meta.len() > 0 => meta.len(),
            _ => {
                discard(&part).await;
                return Err(fail("server returned an empty file".to_string()));
            }
        };

        tokio::fs::rename(&part, &dest)
            .await
            .map_err(|e| AppError::fs(&dest, e))?;

        Ok(DownloadOutcome::Downloaded { local_path, bytes })
    }
}

async fn existing_size(path: &Path) -> Option<u64> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() && meta.len() > 0 => Some(meta.len()),
        _ => None,
    }
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), "Failed to remove partial download: {}", e);
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// File name for an attachment: `{message_id}_{name}`.
///
/// `name` is the sanitized original file name, or `{kind}.{ext}` when the
/// sender gave none. The whole name fits in `max_len` bytes.
#[must_use]
pub fn destination_name(
    message_id: i32,
    kind: MediaKind,
    original_filename: Option<&str>,
    max_len: usize,
) -> String {
    let prefix = format!("{message_id}_");
    let budget = max_len.saturating_sub(prefix.len()).max(1);

    let name = original_filename
        .map(|n| sanitize_filename(n, budget))
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| {
            let generated = match kind.default_extension() {
                Some(ext) => format!("{kind}.{ext}"),
                None => kind.to_string(),
            };
            truncate_preserving_extension(&generated, budget)
        });

    format!("{prefix}{name}")
}

/// Strips path separators and control characters, neutralizes leading
/// dots and shortens the name to `max_len` bytes.
#[must_use]
pub fn sanitize_filename(name: &str, max_len: usize) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\') && !c.is_control())
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_start_matches('.');
    truncate_preserving_extension(trimmed, max_len)
}

fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    let (stem, ext) = match name.rfind('.') {
        Some(i) if i > 0 && name.len() - i <= MAX_EXTENSION_LEN && name.len() - i < max_len => {
            (&name[..i], &name[i..])
        }
        _ => (name, ""),
    };

    let mut end = max_len - ext.len();
    while !stem.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{}", &stem[..end], ext)
}
