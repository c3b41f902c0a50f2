//! Ports to the messaging service.
//!
//! The export pipeline only talks to Telegram through these traits. The
//! live adapter lives in `infrastructure::telegram`; tests drive the same
//! pipeline with scripted fakes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{ConversationCandidate, Credentials, ForwardOrigin, MediaKind, Result};

/// An attachment as reported by the client, with the handle needed to
/// download it.
#[derive(Debug, Clone)]
pub struct RemoteMedia<M> {
    pub kind: MediaKind,
    pub original_filename: Option<String>,
    pub mime_type: Option<String>,
    pub size_bytes: Option<u64>,
    /// False for attachments without a file (location, contact, poll, ...).
    pub downloadable: bool,
    pub handle: M,
}

/// A message as reported by the client, before classification.
#[derive(Debug, Clone)]
pub struct RemoteMessage<M> {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub sender_id: Option<i64>,
    pub sender_name: Option<String>,
    pub outgoing: bool,
    pub text: String,
    pub media: Option<RemoteMedia<M>>,
    /// Description of the action for service messages.
    pub service_action: Option<String>,
    pub reply_to_id: Option<i32>,
    pub forward_origin: Option<ForwardOrigin>,
}

/// Failure to retrieve one history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    /// Id of the affected message, when the client knows it.
    pub message_id: Option<i32>,
    pub reason: String,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.message_id {
            Some(id) => write!(f, "message {id}: {}", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

/// Newest-first cursor over a conversation's history.
#[async_trait]
pub trait MessageHistory: Send {
    type Media: Send + Sync;

    /// Next message, `None` once the history (or the limit) is exhausted.
    async fn next_message(
        &mut self,
    ) -> Option<std::result::Result<RemoteMessage<Self::Media>, FetchError>>;
}

/// Authenticated connection to the messaging service.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    type Media: Send + Sync;
    type History: MessageHistory<Media = Self::Media>;

    /// Enumerate the account's dialogs, most recent first.
    async fn dialogs(&mut self) -> Result<Vec<ConversationCandidate>>;

    /// Open the history of a dialog returned by [`Self::dialogs`].
    async fn history(
        &mut self,
        conversation: &ConversationCandidate,
        limit: Option<usize>,
    ) -> Result<Self::History>;

    /// Write an attachment to `destination`, returning the bytes written.
    async fn download(&self, media: &Self::Media, destination: &Path) -> Result<u64>;

    /// Persist the session and close the connection.
    async fn disconnect(&mut self) -> Result<()>;
}

/// Interactive input needed during first-time sign-in.
#[async_trait]
pub trait LoginPrompt: Send + Sync {
    /// Ask for the code Telegram sent to `phone`.
    async fn verification_code(&self, phone: &str) -> Result<String>;

    /// Ask for the two-step verification password.
    async fn password(&self, hint: Option<&str>) -> Result<String>;
}

/// Produces an authenticated client.
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Client: MessagingClient;

    /// Connect, signing in through `prompt` if the session is not yet
    /// authorized.
    async fn authenticate(
        &self,
        credentials: &Credentials,
        prompt: &dyn LoginPrompt,
    ) -> Result<Self::Client>;
}
