//! Domain models for exported Telegram data.
//!
//! These are the records written to `conversation.json`; every field
//! round-trips through serde.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of dialog an account participates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationKind {
    /// Private chat with a user or bot.
    User,
    /// Basic group or megagroup.
    Group,
    /// Broadcast channel.
    Channel,
}

impl std::fmt::Display for ConversationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "User"),
            Self::Group => write!(f, "Group"),
            Self::Channel => write!(f, "Channel"),
        }
    }
}

/// A dialog entry considered when resolving a search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationCandidate {
    /// Telegram peer id.
    pub id: i64,
    /// Full name of a user, or title of a group/channel.
    pub display_name: String,
    /// Public username without the leading `@`.
    #[serde(default)]
    pub username: Option<String>,
    /// Phone number as reported by Telegram (digits only, no `+`).
    #[serde(default)]
    pub phone: Option<String>,
    /// Dialog kind.
    pub kind: ConversationKind,
}

impl ConversationCandidate {
    /// Short human identifier: `@username`, `+phone` or `ID:n`.
    #[must_use]
    pub fn identifier(&self) -> String {
        if let Some(username) = &self.username {
            format!("@{username}")
        } else if let Some(phone) = &self.phone {
            format!("+{phone}")
        } else {
            format!("ID:{}", self.id)
        }
    }

    /// Name used for the export directory.
    #[must_use]
    pub fn export_name(&self) -> String {
        if !self.display_name.trim().is_empty() {
            return self.display_name.clone();
        }
        match (&self.username, self.kind) {
            (Some(username), _) => username.clone(),
            (None, ConversationKind::User) => format!("user_{}", self.id),
            (None, _) => format!("chat_{}", self.id),
        }
    }
}

impl std::fmt::Display for ConversationCandidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.display_name, self.identifier())
    }
}

/// Classification of a message attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Voice,
    Audio,
    Video,
    Document,
    Sticker,
    Other,
}

impl MediaKind {
    /// All kinds, in display order.
    pub const ALL: [Self; 7] = [
        Self::Photo,
        Self::Voice,
        Self::Audio,
        Self::Video,
        Self::Document,
        Self::Sticker,
        Self::Other,
    ];

    /// Subdirectory of the export directory holding files of this kind.
    #[must_use]
    pub const fn subdirectory(self) -> &'static str {
        match self {
            Self::Photo => "photos",
            Self::Voice => "voice",
            Self::Video => "videos",
            Self::Document => "documents",
            Self::Sticker => "stickers",
            Self::Audio | Self::Other => "media",
        }
    }

    /// Extension used when the attachment carries no file name.
    #[must_use]
    pub const fn default_extension(self) -> Option<&'static str> {
        match self {
            Self::Photo => Some("jpg"),
            Self::Voice => Some("ogg"),
            Self::Audio => Some("mp3"),
            Self::Video => Some("mp4"),
            Self::Sticker => Some("webp"),
            Self::Document | Self::Other => None,
        }
    }

    /// Classify a document attachment from its MIME type.
    ///
    /// `voice_note` is set by clients that flag the document as a recorded
    /// voice message; without it, `audio/ogg` is treated as voice too.
    #[must_use]
    pub fn from_document(mime_type: Option<&str>, voice_note: bool) -> Self {
        if voice_note {
            return Self::Voice;
        }
        let mime = mime_type.unwrap_or_default().to_ascii_lowercase();
        match mime.as_str() {
            "audio/ogg" | "audio/opus" => Self::Voice,
            "image/webp" | "application/x-tgsticker" | "video/webm" => Self::Sticker,
            m if m.starts_with("audio/") => Self::Audio,
            m if m.starts_with("video/") => Self::Video,
            _ => Self::Document,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Photo => "photo",
            Self::Voice => "voice",
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Document => "document",
            Self::Sticker => "sticker",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Classification and location metadata for an attachment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Attachment kind.
    pub kind: MediaKind,
    /// File name announced by the sender, if any.
    #[serde(default)]
    pub original_filename: Option<String>,
    /// MIME type, when known.
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size announced by the server, or measured after download.
    #[serde(default)]
    pub size_bytes: Option<u64>,
    /// Path relative to the export directory, set after download.
    #[serde(default)]
    pub local_path: Option<String>,
    /// Reason the download failed, if it did.
    #[serde(default)]
    pub download_error: Option<String>,
}

impl MediaDescriptor {
    /// Create a descriptor that has not been downloaded yet.
    #[must_use]
    pub const fn new(kind: MediaKind) -> Self {
        Self {
            kind,
            original_filename: None,
            mime_type: None,
            size_bytes: None,
            local_path: None,
            download_error: None,
        }
    }

    /// Record a completed download.
    pub fn mark_downloaded(&mut self, local_path: String, size_bytes: u64) {
        self.local_path = Some(local_path);
        self.size_bytes = Some(size_bytes);
        self.download_error = None;
    }

    /// Record a failed download.
    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.local_path = None;
        self.download_error = Some(reason.into());
    }

    /// Whether the download failed.
    #[must_use]
    pub const fn failed(&self) -> bool {
        self.download_error.is_some()
    }

    /// File name shown in transcripts.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.local_path
            .as_deref()
            .or(self.original_filename.as_deref())
            .unwrap_or("(not downloaded)")
    }
}

/// What a message carries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageContent {
    /// Plain text only.
    Text { text: String },
    /// An attachment without caption.
    Media { media: MediaDescriptor },
    /// An attachment with a caption.
    Mixed { text: String, media: MediaDescriptor },
    /// Service message (join, pin, title change, ...). Some actions, such
    /// as a new chat photo, carry an attachment.
    Service {
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media: Option<MediaDescriptor>,
    },
    /// Neither text nor a recognized attachment.
    Empty,
}

impl MessageContent {
    /// Classify raw message parts.
    #[must_use]
    pub fn classify(
        text: &str,
        media: Option<MediaDescriptor>,
        service_action: Option<String>,
    ) -> Self {
        if let Some(action) = service_action {
            return Self::Service { action, media };
        }
        match (text.is_empty(), media) {
            (true, None) => Self::Empty,
            (false, None) => Self::Text {
                text: text.to_string(),
            },
            (true, Some(media)) => Self::Media { media },
            (false, Some(media)) => Self::Mixed {
                text: text.to_string(),
                media,
            },
        }
    }

    /// Message text, if any.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text } | Self::Mixed { text, .. } => Some(text),
            _ => None,
        }
    }

    /// Attachment, if any.
    #[must_use]
    pub const fn media(&self) -> Option<&MediaDescriptor> {
        match self {
            Self::Media { media } | Self::Mixed { media, .. } => Some(media),
            Self::Service { media, .. } => media.as_ref(),
            _ => None,
        }
    }

    /// Mutable attachment, if any.
    pub fn media_mut(&mut self) -> Option<&mut MediaDescriptor> {
        match self {
            Self::Media { media } | Self::Mixed { media, .. } => Some(media),
            Self::Service { media, .. } => media.as_mut(),
            _ => None,
        }
    }
}

/// Where a forwarded message originally came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardOrigin {
    /// Peer id of the original author, when visible.
    #[serde(default)]
    pub sender_id: Option<i64>,
    /// Name of the original author for hidden accounts.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Original send date.
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    /// Id of the message in the origin channel, if any.
    #[serde(default)]
    pub message_id: Option<i32>,
}

/// A single exported message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique within the conversation.
    pub id: i32,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Sender peer id.
    #[serde(default)]
    pub sender_id: Option<i64>,
    /// Sender display name.
    #[serde(default)]
    pub sender_name: Option<String>,
    /// Whether the exporting account sent it.
    #[serde(default)]
    pub outgoing: bool,
    /// Classified content.
    pub content: MessageContent,
    /// Id of the message this one replies to. May point outside the export.
    #[serde(default)]
    pub reply_to_id: Option<i32>,
    /// Forward header, if forwarded.
    #[serde(default)]
    pub forward_origin: Option<ForwardOrigin>,
    /// Retrieval error for failure-marked entries.
    #[serde(default)]
    pub error: Option<String>,
}

impl Message {
    /// Placeholder entry for a message that could not be retrieved.
    #[must_use]
    pub fn failed(id: i32, timestamp: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            id,
            timestamp,
            sender_id: None,
            sender_name: None,
            outgoing: false,
            content: MessageContent::Empty,
            reply_to_id: None,
            forward_origin: None,
            error: Some(reason.into()),
        }
    }

    /// Name shown in transcripts.
    #[must_use]
    pub fn sender_label(&self) -> String {
        match (&self.sender_name, self.outgoing, self.sender_id) {
            (Some(name), _, _) if !name.is_empty() => name.clone(),
            (_, true, _) => "You".to_string(),
            (_, false, Some(id)) => format!("user_{id}"),
            _ => "Unknown".to_string(),
        }
    }
}

/// Counters reported at the end of an export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportSummary {
    /// Number of message entries, failure-marked ones included.
    pub total_messages: usize,
    /// Attachments seen, by kind.
    #[serde(default)]
    pub media_counts: BTreeMap<MediaKind, usize>,
    /// Files transferred in this run.
    #[serde(default)]
    pub downloaded: usize,
    /// Files already present from an earlier run.
    #[serde(default)]
    pub skipped_existing: usize,
    /// Bytes on disk for downloaded or reused files.
    #[serde(default)]
    pub downloaded_bytes: u64,
    /// Messages that could not be retrieved.
    #[serde(default)]
    pub message_failures: usize,
    /// Attachments that could not be downloaded.
    #[serde(default)]
    pub download_failures: usize,
}

impl ExportSummary {
    /// Count an attachment of the given kind.
    pub fn record_media(&mut self, kind: MediaKind) {
        *self.media_counts.entry(kind).or_default() += 1;
    }

    /// Total attachments seen.
    #[must_use]
    pub fn media_total(&self) -> usize {
        self.media_counts.values().sum()
    }

    /// All recoverable failures.
    #[must_use]
    pub const fn failures(&self) -> usize {
        self.message_failures + self.download_failures
    }
}

/// Everything produced by one export run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportResult {
    /// The exported dialog.
    pub conversation: ConversationCandidate,
    /// When the export ran.
    pub exported_at: DateTime<Utc>,
    /// Counters.
    pub summary: ExportSummary,
    /// Messages in chronological order.
    pub messages: Vec<Message>,
}

impl ExportResult {
    /// Sort messages chronologically (ascending id) and refresh the total.
    pub fn normalize(&mut self) {
        self.messages.sort_by_key(|m| m.id);
        self.summary.total_messages = self.messages.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(display_name: &str, username: Option<&str>) -> ConversationCandidate {
        ConversationCandidate {
            id: 42,
            display_name: display_name.into(),
            username: username.map(Into::into),
            phone: None,
            kind: ConversationKind::User,
        }
    }

    #[test]
    fn test_media_kind_subdirectories() {
        assert_eq!(MediaKind::Photo.subdirectory(), "photos");
        assert_eq!(MediaKind::Voice.subdirectory(), "voice");
        assert_eq!(MediaKind::Audio.subdirectory(), "media");
        assert_eq!(MediaKind::Other.subdirectory(), "media");
        assert_eq!(MediaKind::Sticker.subdirectory(), "stickers");
    }

    #[test]
    fn test_document_classification() {
        assert_eq!(MediaKind::from_document(Some("audio/ogg"), false), MediaKind::Voice);
        assert_eq!(MediaKind::from_document(Some("audio/mpeg"), false), MediaKind::Audio);
        assert_eq!(MediaKind::from_document(Some("audio/mpeg"), true), MediaKind::Voice);
        assert_eq!(MediaKind::from_document(Some("video/mp4"), false), MediaKind::Video);
        assert_eq!(MediaKind::from_document(Some("application/pdf"), false), MediaKind::Document);
        assert_eq!(MediaKind::from_document(None, false), MediaKind::Document);
    }

    #[test]
    fn test_content_classification() {
        let photo = MediaDescriptor::new(MediaKind::Photo);

        assert_eq!(MessageContent::classify("", None, None), MessageContent::Empty);
        assert!(matches!(
            MessageContent::classify("hi", None, None),
            MessageContent::Text { .. }
        ));
        assert!(matches!(
            MessageContent::classify("", Some(photo.clone()), None),
            MessageContent::Media { .. }
        ));
        assert!(matches!(
            MessageContent::classify("caption", Some(photo.clone()), None),
            MessageContent::Mixed { .. }
        ));
        assert_eq!(
            MessageContent::classify("", None, Some("pinned message".into())),
            MessageContent::Service {
                action: "pinned message".into(),
                media: None,
            }
        );
    }

    #[test]
    fn test_service_message_keeps_its_attachment() {
        let mut photo = MediaDescriptor::new(MediaKind::Photo);
        photo.mark_downloaded("photos/9_photo.jpg".into(), 42);

        let mut content =
            MessageContent::classify("", Some(photo.clone()), Some("chat edit photo".into()));
        assert!(matches!(content, MessageContent::Service { .. }));
        assert_eq!(content.media(), Some(&photo));
        assert_eq!(content.text(), None);

        content.media_mut().unwrap().mark_failed("expired");
        assert!(content.media().unwrap().failed());
    }

    #[test]
    fn test_descriptor_lifecycle() {
        let mut media = MediaDescriptor::new(MediaKind::Document);
        assert_eq!(media.display_name(), "(not downloaded)");

        media.mark_failed("timeout");
        assert!(media.failed());

        media.mark_downloaded("documents/1_a.pdf".into(), 10);
        assert!(!media.failed());
        assert_eq!(media.display_name(), "documents/1_a.pdf");
        assert_eq!(media.size_bytes, Some(10));
    }

    #[test]
    fn test_candidate_identifier_and_export_name() {
        assert_eq!(candidate("Alice", Some("alice")).identifier(), "@alice");
        assert_eq!(candidate("", Some("alice")).export_name(), "alice");
        assert_eq!(candidate("", None).export_name(), "user_42");

        let mut group = candidate("", None);
        group.kind = ConversationKind::Group;
        group.phone = Some("15551234".into());
        assert_eq!(group.identifier(), "+15551234");
        assert_eq!(group.export_name(), "chat_42");
    }

    #[test]
    fn test_sender_label() {
        let mut msg = Message::failed(1, Utc::now(), "x");
        assert_eq!(msg.sender_label(), "Unknown");
        msg.outgoing = true;
        assert_eq!(msg.sender_label(), "You");
        msg.sender_name = Some("Bob".into());
        assert_eq!(msg.sender_label(), "Bob");
    }

    #[test]
    fn test_summary_counts() {
        let mut summary = ExportSummary::default();
        summary.record_media(MediaKind::Photo);
        summary.record_media(MediaKind::Photo);
        summary.record_media(MediaKind::Voice);
        summary.message_failures = 1;
        summary.download_failures = 2;

        assert_eq!(summary.media_total(), 3);
        assert_eq!(summary.media_counts[&MediaKind::Photo], 2);
        assert_eq!(summary.failures(), 3);
    }
}
