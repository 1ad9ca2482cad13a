use super::types::{
    AccumulatedMessage, DeleteRange, NewMessage, NewOutput, NewThought, RecordWithOutputs,
    Tag, ThoughtRecord, TimeBound,
};
use crate::core::types::{ActorId, ConversationKey};
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Accumulated notes, scoped per (actor, conversation).
pub trait MessageStore: Send + Sync {
    fn append_message<'a>(
        &'a self,
        message: NewMessage,
    ) -> Pin<Box<dyn Future<Output = Result<AccumulatedMessage>> + Send + 'a>>;

    /// Messages at or after the bound, ordered by `(created_at, id)`.
    fn messages_since<'a>(
        &'a self,
        key: ConversationKey,
        bound: TimeBound,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<AccumulatedMessage>>> + Send + 'a>>;

    fn delete_messages<'a>(
        &'a self,
        key: ConversationKey,
        range: DeleteRange,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;
}

pub trait TagStore: Send + Sync {
    fn insert_tag<'a>(
        &'a self,
        key: ConversationKey,
        label: Option<&'a str>,
        created_at: DateTime<Utc>,
    ) -> Pin<Box<dyn Future<Output = Result<Tag>> + Send + 'a>>;

    fn latest_tag<'a>(
        &'a self,
        key: ConversationKey,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Tag>>> + Send + 'a>>;

    fn delete_tag<'a>(&'a self, id: i64)
    -> Pin<Box<dyn Future<Output = Result<bool>> + Send + 'a>>;

    /// Delete `tag` and every older tag of the same pair.
    fn delete_through<'a>(
        &'a self,
        tag: &'a Tag,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;
}

pub trait ThoughtStore: Send + Sync {
    /// Persist a Thought and all of its Outputs as one atomic unit. Returns
    /// the new Thought id.
    fn commit<'a>(
        &'a self,
        thought: NewThought,
        outputs: Vec<NewOutput>,
    ) -> Pin<Box<dyn Future<Output = Result<i64>> + Send + 'a>>;

    /// Ownership-checked read-back; outputs are ordered by platform.
    fn thought_with_outputs<'a>(
        &'a self,
        id: i64,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<RecordWithOutputs>>> + Send + 'a>>;

    fn recent_thoughts<'a>(
        &'a self,
        actor: ActorId,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ThoughtRecord>>> + Send + 'a>>;

    fn count_thoughts<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + 'a>>;
}
