//! Selection and consumption of the accumulated notes a run works on.
//!
//! Precedence when resolving: an active chat session, then the latest tag,
//! then the current UTC day. Consumption happens only after a run commits;
//! a failed run leaves everything in place so the same window resolves
//! again on retry.

use super::types::{ConversationKey, SourceKind};
use crate::store::{
    AccumulatedMessage, DeleteRange, MessageStore, NewMessage, Tag, TagStore, TimeBound,
};
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveTime, Utc};
use std::sync::Arc;

/// Which boundary selected a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowBound {
    ChatSession { started_at: DateTime<Utc> },
    Tag(Tag),
    Day { start: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct Window {
    pub key: ConversationKey,
    pub bound: WindowBound,
    pub messages: Vec<AccumulatedMessage>,
}

impl Window {
    pub fn content(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.messages.last().map(|m| m.created_at)
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.bound {
            WindowBound::ChatSession { .. } => SourceKind::ChatSession,
            WindowBound::Tag(_) => SourceKind::TagWindow,
            WindowBound::Day { .. } => SourceKind::DayWindow,
        }
    }
}

pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

#[derive(Clone)]
pub struct MessageWindow {
    messages: Arc<dyn MessageStore>,
    tags: Arc<dyn TagStore>,
}

impl MessageWindow {
    pub fn new(messages: Arc<dyn MessageStore>, tags: Arc<dyn TagStore>) -> Self {
        Self { messages, tags }
    }

    pub async fn resolve(
        &self,
        key: ConversationKey,
        chat_started_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<Window> {
        let (bound, query) = if let Some(started_at) = chat_started_at {
            (
                WindowBound::ChatSession { started_at },
                TimeBound::Inclusive(started_at),
            )
        } else if let Some(tag) = self
            .tags
            .latest_tag(key)
            .await
            .context("load latest tag")?
        {
            let query = TimeBound::Exclusive(tag.created_at);
            (WindowBound::Tag(tag), query)
        } else {
            let start = start_of_day(now);
            (WindowBound::Day { start }, TimeBound::Inclusive(start))
        };

        let messages = self
            .messages
            .messages_since(key, query)
            .await
            .context("load window messages")?;

        tracing::debug!(
            actor = key.actor,
            source = %window_source(&bound),
            count = messages.len(),
            "window resolved"
        );

        Ok(Window {
            key,
            bound,
            messages,
        })
    }

    /// Delete what a committed run consumed. Messages that arrived after
    /// the window was resolved survive tag and day consumption.
    pub async fn consume(&self, window: &Window) -> Result<()> {
        match &window.bound {
            WindowBound::ChatSession { started_at } => {
                self.messages
                    .delete_messages(window.key, DeleteRange::From(*started_at))
                    .await?;
            }
            WindowBound::Tag(tag) => {
                if let Some(last) = window.last_timestamp() {
                    self.messages
                        .delete_messages(window.key, DeleteRange::Through(last))
                        .await?;
                }
                self.tags.delete_through(tag).await?;
            }
            WindowBound::Day { .. } => {
                if let Some(last) = window.last_timestamp() {
                    self.messages
                        .delete_messages(window.key, DeleteRange::Through(last))
                        .await?;
                }
            }
        }
        Ok(())
    }

    /// Drop a chat session's messages without running anything.
    pub async fn discard_session(
        &self,
        key: ConversationKey,
        started_at: DateTime<Utc>,
    ) -> Result<u64> {
        let removed = self
            .messages
            .delete_messages(key, DeleteRange::From(started_at))
            .await
            .context("discard chat session messages")?;
        tracing::debug!(actor = key.actor, removed, "chat session discarded");
        Ok(removed)
    }

    pub async fn place_tag(
        &self,
        key: ConversationKey,
        label: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Tag> {
        self.tags
            .insert_tag(key, label, now)
            .await
            .context("insert tag")
    }

    pub async fn accumulate(
        &self,
        key: ConversationKey,
        source_message_id: Option<i64>,
        text: &str,
        at: DateTime<Utc>,
    ) -> Result<AccumulatedMessage> {
        self.messages
            .append_message(NewMessage {
                key,
                source_message_id,
                text: text.to_string(),
                created_at: at,
            })
            .await
            .context("append accumulated message")
    }
}

fn window_source(bound: &WindowBound) -> &'static str {
    match bound {
        WindowBound::ChatSession { .. } => "chat_session",
        WindowBound::Tag(_) => "tag",
        WindowBound::Day { .. } => "day",
    }
}
