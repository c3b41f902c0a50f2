//! Telegram adapter built on the `grammers` MTProto client.
//!
//! Implements the application ports: sign-in with a persisted session
//! file, dialog enumeration, newest-first history iteration and media
//! download.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::DateTime;
use futures::stream::{self, BoxStream, StreamExt};
use grammers_client::types::{Chat, Downloadable, Media, Message as TgMessage};
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::Session;
use grammers_tl_types as tl;

use crate::application::{
    Authenticator, FetchError, LoginPrompt, MessageHistory, MessagingClient, RemoteMedia,
    RemoteMessage,
};
use crate::domain::{
    AppError, ConversationCandidate, ConversationKind, Credentials, ForwardOrigin, MediaKind,
    Result,
};

/// Connects to Telegram and signs in when the session is not authorized.
pub struct GrammersAuthenticator {
    max_code_attempts: u32,
}

impl GrammersAuthenticator {
    /// Create an authenticator allowing `max_code_attempts` wrong codes.
    #[must_use]
    pub const fn new(max_code_attempts: u32) -> Self {
        Self { max_code_attempts }
    }
}

#[async_trait]
impl Authenticator for GrammersAuthenticator {
    type Client = TelegramClient;

    async fn authenticate(
        &self,
        credentials: &Credentials,
        prompt: &dyn LoginPrompt,
    ) -> Result<TelegramClient> {
        let session_file = credentials.session_file();
        let session = Session::load_file_or_create(&session_file).map_err(|e| {
            AppError::auth(format!(
                "Failed to load session {}: {e}",
                session_file.display()
            ))
        })?;

        tracing::debug!(session = %session_file.display(), "Connecting to Telegram");
        let client = Client::connect(Config {
            session,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(|e| AppError::auth(format!("Failed to connect: {e}")))?;

        let authorized = client.is_authorized().await.map_err(AppError::client)?;
        if !authorized {
            sign_in(&client, credentials, prompt, self.max_code_attempts).await?;
            client
                .session()
                .save_to_file(&session_file)
                .map_err(|e| AppError::fs(&session_file, e))?;
            tracing::info!(session = %session_file.display(), "Saved session");
        }

        Ok(TelegramClient {
            client,
            session_file,
            chats: HashMap::new(),
        })
    }
}

async fn sign_in(
    client: &Client,
    credentials: &Credentials,
    prompt: &dyn LoginPrompt,
    max_code_attempts: u32,
) -> Result<()> {
    let phone = credentials.phone_number.as_str();
    let token = client
        .request_login_code(phone)
        .await
        .map_err(|e| AppError::auth(format!("Could not request a login code: {e}")))?;

    for attempt in 1..=max_code_attempts.max(1) {
        let code = prompt.verification_code(phone).await?;

        match client.sign_in(&token, code.trim()).await {
            Ok(user) => {
                tracing::info!(user = %user.full_name(), "Signed in");
                return Ok(());
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                let hint = password_token.hint().map(str::to_string);
                let password = prompt.password(hint.as_deref()).await?;
                client
                    .check_password(password_token, password.trim())
                    .await
                    .map_err(|e| AppError::auth(format!("Two-step verification failed: {e}")))?;
                tracing::info!("Signed in with two-step verification");
                return Ok(());
            }
            Err(SignInError::InvalidCode) => {
                tracing::warn!(attempt, "Invalid verification code");
            }
            Err(e) => return Err(AppError::auth(e.to_string())),
        }
    }

    Err(AppError::auth(format!(
        "Gave up after {max_code_attempts} invalid verification codes"
    )))
}

/// Authenticated grammers client.
pub struct TelegramClient {
    client: Client,
    session_file: PathBuf,
    chats: HashMap<i64, Chat>,
}

impl TelegramClient {
    /// Describe the signed-in account.
    ///
    /// # Errors
    /// Returns error if the account cannot be fetched.
    pub async fn account_label(&self) -> Result<String> {
        let me = self.client.get_me().await.map_err(AppError::client)?;
        Ok(match me.username() {
            Some(username) => format!("{} (@{username})", me.full_name()),
            None => me.full_name(),
        })
    }
}

#[async_trait]
impl MessagingClient for TelegramClient {
    type Media = Media;
    type History = TelegramHistory;

    async fn dialogs(&mut self) -> Result<Vec<ConversationCandidate>> {
        let mut iter = self.client.iter_dialogs();
        let mut candidates = Vec::new();

        while let Some(dialog) = iter.next().await.map_err(AppError::client)? {
            let chat = dialog.chat();
            candidates.push(candidate_from_chat(chat));
            self.chats.insert(chat.id(), chat.clone());
        }

        Ok(candidates)
    }

    async fn history(
        &mut self,
        conversation: &ConversationCandidate,
        limit: Option<usize>,
    ) -> Result<TelegramHistory> {
        let chat = self.chats.get(&conversation.id).ok_or_else(|| {
            AppError::client(format!(
                "Conversation {} is not in the dialog list",
                conversation.id
            ))
        })?;

        let mut iter = self.client.iter_messages(chat.pack());
        if let Some(limit) = limit {
            iter = iter.limit(limit);
        }

        let messages = stream::unfold(Some(iter), |state| async move {
            let mut iter = state?;
            match iter.next().await {
                Ok(Some(message)) => Some((Ok(message), Some(iter))),
                Ok(None) => None,
                // A failed page cannot be resumed; report it and stop.
                Err(e) => Some((Err(e.to_string()), None)),
            }
        })
        .boxed();

        Ok(TelegramHistory { messages })
    }

    async fn download(&self, media: &Media, destination: &Path) -> Result<u64> {
        self.client
            .download_media(&Downloadable::Media(media.clone()), destination)
            .await
            .map_err(AppError::client)?;

        let meta = tokio::fs::metadata(destination)
            .await
            .map_err(|e| AppError::fs(destination, e))?;
        Ok(meta.len())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.client
            .session()
            .save_to_file(&self.session_file)
            .map_err(|e| AppError::fs(&self.session_file, e))
    }
}

/// Newest-first message stream of one chat.
pub struct TelegramHistory {
    messages: BoxStream<'static, std::result::Result<TgMessage, String>>,
}

#[async_trait]
impl MessageHistory for TelegramHistory {
    type Media = Media;

    async fn next_message(
        &mut self,
    ) -> Option<std::result::Result<RemoteMessage<Media>, FetchError>> {
        let entry = self.messages.next().await?;
        Some(
            entry
                .map(|message| remote_message(&message))
                .map_err(|reason| FetchError {
                    message_id: None,
                    reason,
                }),
        )
    }
}

fn candidate_from_chat(chat: &Chat) -> ConversationCandidate {
    let (display_name, phone, kind) = match chat {
        Chat::User(user) => (
            user.full_name(),
            user.phone().map(str::to_string),
            ConversationKind::User,
        ),
        Chat::Group(_) => (chat.name().to_string(), None, ConversationKind::Group),
        Chat::Channel(_) => (chat.name().to_string(), None, ConversationKind::Channel),
    };

    ConversationCandidate {
        id: chat.id(),
        display_name,
        username: chat.username().map(str::to_string),
        phone,
        kind,
    }
}

fn chat_label(chat: &Chat) -> String {
    match chat {
        Chat::User(user) => user.full_name(),
        _ => chat.name().to_string(),
    }
}

fn remote_message(message: &TgMessage) -> RemoteMessage<Media> {
    let sender = message.sender();

    RemoteMessage {
        id: message.id(),
        timestamp: message.date(),
        sender_id: sender.as_ref().map(Chat::id),
        sender_name: sender.as_ref().map(chat_label),
        outgoing: message.outgoing(),
        text: message.text().to_string(),
        media: message.media().and_then(remote_media),
        service_action: message
            .action()
            .map(|action| describe_action(&format!("{action:?}"))),
        reply_to_id: message.reply_to_message_id(),
        forward_origin: message.forward_header().map(forward_origin),
    }
}

fn remote_media(media: Media) -> Option<RemoteMedia<Media>> {
    let (kind, original_filename, mime_type, size_bytes, downloadable) = match &media {
        Media::Photo(_) => (
            MediaKind::Photo,
            None,
            Some("image/jpeg".to_string()),
            None,
            true,
        ),
        Media::Sticker(_) => (MediaKind::Sticker, None, None, None, true),
        Media::Document(document) => {
            let mime_type = document.mime_type().map(str::to_string);
            let name = Some(document.name().to_string()).filter(|n| !n.is_empty());
            (
                MediaKind::from_document(mime_type.as_deref(), false),
                name,
                mime_type,
                u64::try_from(document.size()).ok(),
                true,
            )
        }
        // Link previews are part of the text, not an attachment.
        Media::WebPage(_) => return None,
        // Geo, venue, contact, poll, dice: recorded, nothing to fetch.
        _ => (MediaKind::Other, None, None, None, false),
    };

    Some(RemoteMedia {
        kind,
        original_filename,
        mime_type,
        size_bytes,
        downloadable,
        handle: media,
    })
}

fn forward_origin(header: tl::enums::MessageFwdHeader) -> ForwardOrigin {
    let tl::enums::MessageFwdHeader::Header(header) = header;

    let sender_id = header.from_id.map(|peer| match peer {
        tl::enums::Peer::User(user) => user.user_id,
        tl::enums::Peer::Chat(chat) => chat.chat_id,
        tl::enums::Peer::Channel(channel) => channel.channel_id,
    });

    ForwardOrigin {
        sender_id,
        sender_name: header.from_name,
        date: DateTime::from_timestamp(i64::from(header.date), 0),
        message_id: header.channel_post,
    }
}

/// Turns a debug-printed service action such as
/// `ChatAddUser(MessageActionChatAddUser { .. })` into `chat add user`.
fn describe_action(debug: &str) -> String {
    let variant = debug.split(['(', ' ', '{']).next().unwrap_or(debug);
    let mut out = String::with_capacity(variant.len() + 4);

    for (i, c) in variant.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push(' ');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}
