//! Bot API wire types, limited to the fields the bot reads.

use crate::transport::traits::{DocumentRef, InboundEvent, InboundPayload};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub from: Option<User>,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    pub text: Option<String>,
    pub document: Option<Document>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Document {
    pub file_id: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    pub id: i64,
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BotCommand<'a> {
    pub command: &'a str,
    pub description: &'a str,
}

impl Update {
    /// Map an update to an inbound event. Updates without a message or a
    /// sender (channel posts, edits, service messages) yield `None`.
    pub fn into_event(self) -> Option<InboundEvent> {
        let message = self.message?;
        let actor = message.from.as_ref()?.id;

        let payload = match (message.text, message.document) {
            (Some(text), _) => InboundPayload::from_text(&text),
            (None, Some(doc)) => InboundPayload::Document(DocumentRef {
                file_id: doc.file_id,
                file_name: doc.file_name,
                size: doc.file_size,
            }),
            (None, None) => InboundPayload::Unsupported,
        };

        Some(InboundEvent {
            actor,
            conversation: message.chat.id,
            message_id: Some(message.message_id),
            received_at: DateTime::<Utc>::from_timestamp(message.date, 0)
                .filter(|_| message.date > 0)
                .unwrap_or_else(Utc::now),
            payload,
        })
    }
}
