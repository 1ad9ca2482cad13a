use crate::core::types::{ActorId, ConversationKey};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// An uploaded file, not yet downloaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundPayload {
    Text(String),
    /// `/name args`; `name` is lowercased and stripped of any `@bot` suffix.
    Command { name: String, args: String },
    Document(DocumentRef),
    Unsupported,
}

impl InboundPayload {
    /// Classify a text message as a command or plain text.
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim_start();
        let Some(rest) = trimmed.strip_prefix('/') else {
            return Self::Text(text.to_string());
        };
        let (head, args) = rest
            .split_once(char::is_whitespace)
            .unwrap_or((rest, ""));
        let name = head.split('@').next().unwrap_or_default();
        if name.is_empty() {
            return Self::Text(text.to_string());
        }
        Self::Command {
            name: name.to_ascii_lowercase(),
            args: args.trim().to_string(),
        }
    }
}

/// A message received from a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub actor: ActorId,
    /// Chat the message arrived in; replies go here.
    pub conversation: i64,
    pub message_id: Option<i64>,
    pub received_at: DateTime<Utc>,
    pub payload: InboundPayload,
}

impl InboundEvent {
    pub fn key(&self) -> ConversationKey {
        ConversationKey::new(self.actor, self.conversation)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    /// Already escaped for Telegram MarkdownV2.
    MarkdownV2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub format: TextFormat,
}

impl OutboundMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::Plain,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: TextFormat::MarkdownV2,
        }
    }
}

/// Chat transport the bot talks through.
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    fn send<'a>(
        &'a self,
        message: &'a OutboundMessage,
        recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    /// Deliver inbound events until the receiver closes or the transport fails.
    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<InboundEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>>;

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { true })
    }

    fn max_message_length(&self) -> usize {
        usize::MAX
    }

    /// Best-effort "typing" indicator.
    fn send_activity<'a>(
        &'a self,
        _recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }

    fn download_document<'a>(
        &'a self,
        _document: &'a DocumentRef,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move { anyhow::bail!("document download not supported by this channel") })
    }

    /// Publish the command menu, where the transport has one.
    fn register_commands<'a>(
        &'a self,
        _commands: &'a [(&'static str, String)],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move { Ok(()) })
    }
}
