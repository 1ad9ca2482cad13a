use crate::core::types::{ActorId, ConversationKey, Platform, SourceKind};
use chrono::{DateTime, SecondsFormat, Utc};

/// A plain inbound note waiting to be consumed by a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccumulatedMessage {
    pub id: i64,
    pub key: ConversationKey,
    pub source_message_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub key: ConversationKey,
    pub source_message_id: Option<i64>,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Durable marker bounding the lower edge of a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub key: ConversationKey,
    pub label: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Lower bound for a message query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeBound {
    /// `created_at >= t`
    Inclusive(DateTime<Utc>),
    /// `created_at > t`
    Exclusive(DateTime<Utc>),
}

/// Which messages a delete removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRange {
    /// `created_at >= t`
    From(DateTime<Utc>),
    /// `created_at <= t`
    Through(DateTime<Utc>),
}

/// Evaluation record of one pipeline run, ready to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct NewThought {
    pub actor: ActorId,
    pub created_at: DateTime<Utc>,
    pub raw_input: String,
    pub source: SourceKind,
    pub idea_type: String,
    pub novelty_score: Option<u8>,
    pub clarity_score: Option<u8>,
    pub publishable: bool,
    pub risk_level: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOutput {
    pub platform: Platform,
    pub content: String,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThoughtRecord {
    pub id: i64,
    pub actor: ActorId,
    pub created_at: DateTime<Utc>,
    pub raw_input: String,
    pub source: SourceKind,
    pub idea_type: String,
    pub novelty_score: Option<u8>,
    pub clarity_score: Option<u8>,
    pub publishable: bool,
    pub risk_level: String,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub id: i64,
    pub thought_id: i64,
    pub created_at: DateTime<Utc>,
    pub platform: Platform,
    pub content: String,
    pub tokens_used: u64,
}

/// A thought with its outputs, as `/show` reads it back.
pub type RecordWithOutputs = (ThoughtRecord, Vec<OutputRecord>);

/// Fixed-width UTC encoding; lexical order equals chronological order.
pub fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_ts(raw: &str) -> anyhow::Result<DateTime<Utc>> {
    let parsed = DateTime::parse_from_rfc3339(raw)
        .map_err(|e| anyhow::anyhow!("invalid stored timestamp {raw:?}: {e}"))?;
    Ok(parsed.with_timezone(&Utc))
}
