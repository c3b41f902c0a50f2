//! Output formatting for exported conversations.
//!
//! `conversation.json` is a lossless encoding of [`ExportResult`];
//! `conversation.txt` is a readable transcript. Console summaries and the
//! dialog table are also built here.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};

use crate::domain::{
    AppError, ConversationCandidate, ExportResult, ExportSummary, ForwardOrigin, MediaKind,
    Message, MessageContent, Result,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Encodes the export as pretty-printed JSON.
///
/// # Errors
/// Returns error if serialization fails.
pub fn serialize_json(result: &ExportResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(AppError::json)
}

/// Decodes a document produced by [`serialize_json`].
///
/// # Errors
/// Returns error if the document is not a valid export.
pub fn parse_json(document: &str) -> Result<ExportResult> {
    serde_json::from_str(document).map_err(AppError::json)
}

/// Renders the export as transcript lines, oldest message first.
pub fn serialize_text(result: &ExportResult) -> Vec<String> {
    let conv = &result.conversation;
    let mut lines = vec![
        format!("Conversation with: {} ({})", conv.display_name, conv.identifier()),
        format!(
            "Exported on: {} UTC",
            result.exported_at.format(TIMESTAMP_FORMAT)
        ),
        format!("Total messages: {}", result.messages.len()),
        "-".repeat(50),
        String::new(),
    ];

    for message in &result.messages {
        push_message(&mut lines, message);
        lines.push(String::new());
    }

    lines
}

fn push_message(lines: &mut Vec<String>, message: &Message) {
    lines.push(format!(
        "[{}] {}",
        message.timestamp.format(TIMESTAMP_FORMAT),
        message.sender_label()
    ));

    if let Some(text) = message.content.text() {
        lines.extend(text.lines().map(str::to_string));
    }

    if let MessageContent::Service { action, .. } = &message.content {
        lines.push(format!("    ⚙️ Service: {action}"));
    }

    if let Some(media) = message.content.media() {
        let mut line = format!("    📎 Media: {} - {}", media.kind, media.display_name());
        if let Some(reason) = &media.download_error {
            line.push_str(&format!(" (download failed: {reason})"));
        }
        lines.push(line);
    }

    if let Some(reply_to) = message.reply_to_id {
        lines.push(format!("    ↩️ Reply to message ID: {reply_to}"));
    }

    if let Some(origin) = &message.forward_origin {
        lines.push(format!("    ↪️ Forwarded from: {}", describe_origin(origin)));
    }

    if let Some(error) = &message.error {
        lines.push(format!("    ⚠️ Error: {error}"));
    }
}

fn describe_origin(origin: &ForwardOrigin) -> String {
    let who = match (&origin.sender_name, origin.sender_id) {
        (Some(name), _) => name.clone(),
        (None, Some(id)) => format!("ID:{id}"),
        (None, None) => "hidden sender".to_string(),
    };

    match origin.date {
        Some(date) => format!("{who} at {}", date.format(TIMESTAMP_FORMAT)),
        None => who,
    }
}

/// Formats the end-of-run summary for display.
pub fn format_summary(summary: &ExportSummary) -> String {
    let mut out = format!(
        "{}\n  Messages: {}\n  Media: {}",
        "📊 Export summary".bold(),
        summary.total_messages.to_string().cyan(),
        summary.media_total().to_string().cyan(),
    );

    for kind in MediaKind::ALL {
        if let Some(count) = summary.media_counts.get(&kind) {
            out.push_str(&format!("\n    {kind}: {count}"));
        }
    }

    out.push_str(&format!(
        "\n  Downloaded: {} ({})\n  Already present: {}",
        summary.downloaded.to_string().green(),
        format_bytes(summary.downloaded_bytes),
        summary.skipped_existing.to_string().blue(),
    ));

    let failures = summary.failures().to_string();
    let failures = if summary.failures() == 0 {
        failures.green()
    } else {
        failures.yellow()
    };
    out.push_str(&format!(
        "\n  Failures: {} ({} messages, {} downloads)",
        failures, summary.message_failures, summary.download_failures
    ));

    out
}

/// Formats a table listing of dialogs.
pub fn format_dialogs_table(dialogs: &[ConversationCandidate]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["#", "Type", "Name", "Identifier"]);

    for (i, dialog) in dialogs.iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            dialog.kind.to_string(),
            truncate(&dialog.display_name, 40),
            dialog.identifier(),
        ]);
    }

    table.to_string()
}

/// Format bytes as human-readable string.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{bytes} B")
    }
}

/// Truncates a string to max chars with ellipsis.
fn truncate(s: &str, max_len: usize) -> String {
    let s = s.lines().next().unwrap_or(s);
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConversationKind, MediaDescriptor};
    use chrono::{TimeZone, Utc};

    fn sample() -> ExportResult {
        let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let mut photo = MediaDescriptor::new(MediaKind::Photo);
        photo.mark_downloaded("photos/2_photo.jpg".into(), 1234);

        ExportResult {
            conversation: ConversationCandidate {
                id: 7,
                display_name: "Alice".into(),
                username: Some("alice".into()),
                phone: None,
                kind: ConversationKind::User,
            },
            exported_at: t0,
            summary: ExportSummary::default(),
            messages: vec![
                Message {
                    id: 1,
                    timestamp: t0,
                    sender_id: Some(7),
                    sender_name: Some("Alice".into()),
                    outgoing: false,
                    content: MessageContent::Text {
                        text: "hello\nworld".into(),
                    },
                    reply_to_id: None,
                    forward_origin: None,
                    error: None,
                },
                Message {
                    id: 2,
                    timestamp: t0 + chrono::Duration::seconds(1),
                    sender_id: Some(8),
                    sender_name: None,
                    outgoing: true,
                    content: MessageContent::Media { media: photo },
                    reply_to_id: Some(1),
                    forward_origin: Some(ForwardOrigin {
                        sender_id: None,
                        sender_name: Some("Carol".into()),
                        date: None,
                        message_id: None,
                    }),
                    error: None,
                },
            ],
        }
    }

    #[test]
    fn test_json_round_trip() {
        let result = sample();
        let json = serialize_json(&result).unwrap();
        assert_eq!(parse_json(&json).unwrap(), result);
    }

    /// One message per content variant, with every optional field set
    /// somewhere.
    fn every_variant() -> ExportResult {
        let mut result = sample();
        let t0 = result.exported_at;

        let mut voice = MediaDescriptor::new(MediaKind::Voice);
        voice.original_filename = Some("note.ogg".into());
        voice.mime_type = Some("audio/ogg".into());
        voice.size_bytes = Some(2048);
        voice.mark_failed("timed out after 300s");

        let mut chat_photo = MediaDescriptor::new(MediaKind::Photo);
        chat_photo.mime_type = Some("image/jpeg".into());
        chat_photo.mark_downloaded("photos/5_photo.jpg".into(), 900);

        result.messages.extend([
            Message {
                id: 3,
                timestamp: t0 + chrono::Duration::seconds(2),
                sender_id: Some(7),
                sender_name: Some("Alice".into()),
                outgoing: false,
                content: MessageContent::Mixed {
                    text: "listen".into(),
                    media: voice,
                },
                reply_to_id: Some(99),
                forward_origin: Some(ForwardOrigin {
                    sender_id: Some(-100_123),
                    sender_name: None,
                    date: Some(t0 - chrono::Duration::days(3)),
                    message_id: Some(55),
                }),
                error: None,
            },
            Message {
                id: 4,
                timestamp: t0 + chrono::Duration::seconds(3),
                sender_id: None,
                sender_name: None,
                outgoing: false,
                content: MessageContent::Service {
                    action: "chat add user".into(),
                    media: None,
                },
                reply_to_id: None,
                forward_origin: None,
                error: None,
            },
            Message {
                id: 5,
                timestamp: t0 + chrono::Duration::seconds(4),
                sender_id: Some(7),
                sender_name: Some("Alice".into()),
                outgoing: false,
                content: MessageContent::Service {
                    action: "chat edit photo".into(),
                    media: Some(chat_photo),
                },
                reply_to_id: None,
                forward_origin: None,
                error: None,
            },
            Message {
                id: 6,
                timestamp: t0 + chrono::Duration::seconds(5),
                sender_id: Some(8),
                sender_name: Some("Bob".into()),
                outgoing: false,
                content: MessageContent::Empty,
                reply_to_id: None,
                forward_origin: None,
                error: None,
            },
            Message::failed(7, t0 + chrono::Duration::seconds(6), "MESSAGE_ID_INVALID"),
        ]);

        let summary = &mut result.summary;
        summary.record_media(MediaKind::Photo);
        summary.record_media(MediaKind::Photo);
        summary.record_media(MediaKind::Voice);
        summary.downloaded = 1;
        summary.skipped_existing = 1;
        summary.downloaded_bytes = 2134;
        summary.message_failures = 1;
        summary.download_failures = 1;
        result.normalize();
        result
    }

    #[test]
    fn test_json_round_trip_every_variant() {
        let result = every_variant();
        let json = serialize_json(&result).unwrap();
        let parsed = parse_json(&json).unwrap();

        assert_eq!(parsed, result);
        assert_eq!(parsed.messages.len(), 7);
        assert_eq!(parsed.summary.media_counts[&MediaKind::Voice], 1);
    }

    #[test]
    fn test_service_attachment_is_serialized() {
        let value: serde_json::Value =
            serde_json::from_str(&serialize_json(&every_variant()).unwrap()).unwrap();

        let plain = &value["messages"][3]["content"];
        assert_eq!(plain["type"], "service");
        assert!(plain.get("media").is_none());

        let with_photo = &value["messages"][4]["content"];
        assert_eq!(with_photo["media"]["local_path"], "photos/5_photo.jpg");

        let lines = serialize_text(&every_variant());
        assert!(lines.iter().any(|l| l == "    ⚙️ Service: chat edit photo"));
        assert!(lines
            .iter()
            .any(|l| l == "    📎 Media: photo - photos/5_photo.jpg"));
    }

    #[test]
    fn test_json_uses_stable_keys() {
        let value: serde_json::Value =
            serde_json::from_str(&serialize_json(&sample()).unwrap()).unwrap();
        let second = &value["messages"][1];
        assert_eq!(second["content"]["type"], "media");
        assert_eq!(second["content"]["media"]["kind"], "photo");
        assert_eq!(second["content"]["media"]["local_path"], "photos/2_photo.jpg");
        assert_eq!(second["reply_to_id"], 1);
    }

    #[test]
    fn test_text_transcript() {
        let lines = serialize_text(&sample());

        assert_eq!(lines[0], "Conversation with: Alice (@alice)");
        assert_eq!(lines[2], "Total messages: 2");

        let body = &lines[5..];
        assert_eq!(body[0], "[2024-05-01 10:00:00] Alice");
        assert_eq!(body[1], "hello");
        assert_eq!(body[2], "world");
        assert_eq!(body[3], "");
        assert_eq!(body[4], "[2024-05-01 10:00:01] You");
        assert_eq!(body[5], "    📎 Media: photo - photos/2_photo.jpg");
        assert_eq!(body[6], "    ↩️ Reply to message ID: 1");
        assert_eq!(body[7], "    ↪️ Forwarded from: Carol");
    }

    #[test]
    fn test_text_marks_failures() {
        let mut result = sample();
        result.messages.push(Message::failed(3, result.exported_at, "timeout"));
        let lines = serialize_text(&result);
        assert!(lines.iter().any(|l| l == "    ⚠️ Error: timeout"));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world!", 8), "hello...");
    }

    #[test]
    fn test_dialogs_table_lists_identifiers() {
        let table = format_dialogs_table(&[sample().conversation]);
        assert!(table.contains("@alice"));
        assert!(table.contains("User"));
    }
}
