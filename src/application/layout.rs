//! Export directory layout.
//!
//! One run produces one directory `{base}/{name}_{YYYYMMDD_HHMMSS}` holding
//! the two transcripts and a fixed set of media subdirectories.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};

use crate::domain::{AppError, ExportResult, Result};

use super::formatter::{serialize_json, serialize_text};

/// Media subdirectories created in every export directory.
pub const MEDIA_SUBDIRECTORIES: [&str; 6] =
    ["photos", "voice", "videos", "documents", "stickers", "media"];

/// JSON transcript file name.
pub const JSON_FILE: &str = "conversation.json";

/// Text transcript file name.
pub const TEXT_FILE: &str = "conversation.txt";

const MAX_DIR_NAME_LEN: usize = 64;

/// Creates a fresh export directory with its media subdirectories.
///
/// An existing directory with the same name is never reused; a numeric
/// suffix is appended instead.
///
/// # Errors
/// Returns `FileSystem` if a directory cannot be created.
pub fn prepare_output_dir<Tz: TimeZone>(
    base_dir: &Path,
    conversation_name: &str,
    timestamp: &DateTime<Tz>,
) -> Result<PathBuf>
where
    Tz::Offset: std::fmt::Display,
{
    fs::create_dir_all(base_dir).map_err(|e| AppError::fs(base_dir, e))?;

    let stem = format!(
        "{}_{}",
        sanitize_dir_name(conversation_name),
        timestamp.format("%Y%m%d_%H%M%S")
    );

    let dir = create_unique_dir(base_dir, &stem)?;

    for sub in MEDIA_SUBDIRECTORIES {
        let path = dir.join(sub);
        fs::create_dir_all(&path).map_err(|e| AppError::fs(&path, e))?;
    }

    tracing::info!(path = %dir.display(), "Created export directory");
    Ok(dir)
}

fn create_unique_dir(base_dir: &Path, stem: &str) -> Result<PathBuf> {
    let mut attempt = 1u32;
    loop {
        let name = if attempt == 1 {
            stem.to_string()
        } else {
            format!("{stem}_{attempt}")
        };
        let path = base_dir.join(name);

        match fs::create_dir(&path) {
            Ok(()) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tracing::debug!(path = %path.display(), "Export directory exists, trying next suffix");
                attempt += 1;
            }
            Err(e) => return Err(AppError::fs(&path, e)),
        }
    }
}

/// Writes `conversation.json` and `conversation.txt` into `dir`.
///
/// # Errors
/// Returns error if serialization or writing fails.
pub fn write_artifacts(dir: &Path, result: &ExportResult) -> Result<()> {
    let json = serialize_json(result)?;
    write_file(&dir.join(JSON_FILE), &json)?;

    let mut text = serialize_text(result).join("\n");
    text.push('\n');
    write_file(&dir.join(TEXT_FILE), &text)?;

    tracing::info!(dir = %dir.display(), "Wrote transcripts");
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| AppError::fs(path, e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| AppError::fs(path, e))
}

/// Makes a conversation name safe to use as a directory name.
#[must_use]
pub fn sanitize_dir_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                ' '
            }
        })
        .collect();

    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let truncated: String = joined.chars().take(MAX_DIR_NAME_LEN).collect();

    if truncated.is_empty() {
        "conversation".to_string()
    } else {
        truncated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_dir_name() {
        assert_eq!(sanitize_dir_name("Alice Smith"), "Alice_Smith");
        assert_eq!(sanitize_dir_name("../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_dir_name("Привет мир"), "Привет_мир");
        assert_eq!(sanitize_dir_name("🚀🚀"), "conversation");
        assert_eq!(sanitize_dir_name(&"a".repeat(200)).len(), MAX_DIR_NAME_LEN);
    }

    #[test]
    fn test_prepare_creates_layout() {
        let base = tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let dir = prepare_output_dir(base.path(), "Alice Smith", &ts).unwrap();

        assert_eq!(dir.file_name().unwrap(), "Alice_Smith_20240309_140507");
        for sub in MEDIA_SUBDIRECTORIES {
            assert!(dir.join(sub).is_dir(), "missing {sub}");
        }
    }

    #[test]
    fn test_prepare_never_reuses_directory() {
        let base = tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();

        let first = prepare_output_dir(base.path(), "Bob", &ts).unwrap();
        let second = prepare_output_dir(base.path(), "Bob", &ts).unwrap();

        assert_ne!(first, second);
        assert_eq!(second.file_name().unwrap(), "Bob_20240309_140507_2");
    }

    #[test]
    fn test_prepare_fails_on_unwritable_base() {
        let base = tempdir().unwrap();
        let blocker = base.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let err = prepare_output_dir(&blocker, "Bob", &ts).unwrap_err();
        assert!(matches!(err, AppError::FileSystem { .. }));
    }
}
