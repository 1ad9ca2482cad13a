#![allow(dead_code, clippy::missing_panics_doc)]

use media_leverage::app::{Worker, WorkerDeps, WorkerSettings};
use media_leverage::core::{ActorId, ConversationKey, RunReport, RunSink};
use media_leverage::llm::{Provider, ProviderMessage, ProviderResponse};
use media_leverage::security::{RatePolicy, RateLimiter};
use media_leverage::store::{
    MessageStore, NewOutput, NewThought, OutputRecord, SqliteStore, TagStore, ThoughtRecord,
    ThoughtStore,
};
use media_leverage::transport::{
    Channel, DocumentRef, InboundEvent, InboundPayload, OutboundMessage, TextFormat,
};
use std::collections::{HashMap, HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const ACTOR: ActorId = 42;
pub const CHAT: i64 = 4200;
pub const STRANGER: ActorId = 7;

pub fn key() -> ConversationKey {
    ConversationKey::new(ACTOR, CHAT)
}

/// Evaluation JSON as the backend would return it.
pub fn evaluation_json(idea_type: &str, novelty: u8, publishable: bool) -> String {
    serde_json::json!({
        "idea_type": idea_type,
        "novelty_score": novelty,
        "clarity_score": 7,
        "publishable": publishable,
        "risk_level": "low",
        "summary": format!("a {idea_type} worth sharing"),
        "key_points": ["first point", "second point"],
    })
    .to_string()
}

/// Same as [`evaluation_json`] with a per-platform verdict list attached.
pub fn evaluation_with_assessments(
    idea_type: &str,
    novelty: u8,
    assessments: serde_json::Value,
) -> String {
    let mut value: serde_json::Value =
        serde_json::from_str(&evaluation_json(idea_type, novelty, true)).unwrap();
    value["platform_assessments"] = assessments;
    value.to_string()
}

#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub system: String,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
}

impl ProviderCall {
    pub fn last_user(&self) -> &str {
        self.messages.last().map_or("", |m| m.content.as_str())
    }

    /// Platform a generation call was made for.
    pub fn platform(&self) -> Option<String> {
        let user = self.last_user();
        let (_, tail) = user.rsplit_once("Write the ")?;
        tail.split_whitespace().next().map(str::to_string)
    }
}

/// Backend double. Generation calls are answered with a draft naming the
/// platform; every other call takes the next scripted reply.
#[derive(Default)]
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<anyhow::Result<String>>>,
    failing_platforms: Mutex<HashSet<String>>,
    calls: Mutex<Vec<ProviderCall>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn reply(&self, text: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(text.into()));
    }

    pub fn fail_next(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(anyhow::anyhow!(message.to_string())));
    }

    pub fn fail_platform(&self, platform: &str) {
        self.failing_platforms
            .lock()
            .unwrap()
            .insert(platform.to_string());
    }

    pub fn heal_platform(&self, platform: &str) {
        self.failing_platforms.lock().unwrap().remove(platform);
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn generated_platforms(&self) -> Vec<String> {
        self.calls().iter().filter_map(ProviderCall::platform).collect()
    }
}

impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    fn converse<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ProviderMessage],
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            let call = ProviderCall {
                system: system.to_string(),
                messages: messages.to_vec(),
                max_tokens,
            };
            let platform = call.platform();
            self.calls.lock().unwrap().push(call);

            if let Some(platform) = platform {
                if self.failing_platforms.lock().unwrap().contains(&platform) {
                    anyhow::bail!("backend timeout while writing {platform}");
                }
                return Ok(ProviderResponse::with_usage(
                    format!("draft for {platform}"),
                    20,
                    30,
                ));
            }

            let next = self.replies.lock().unwrap().pop_front();
            match next {
                Some(Ok(text)) => Ok(ProviderResponse::with_usage(text, 100, 50)),
                Some(Err(e)) => Err(e),
                None => anyhow::bail!("no scripted reply left"),
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub chat_id: i64,
    pub text: String,
    pub format: TextFormat,
}

/// Channel double that records everything the bot sends.
#[derive(Default)]
pub struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
    documents: Mutex<HashMap<String, Vec<u8>>>,
    activity: AtomicUsize,
    rejected: Mutex<Vec<String>>,
}

impl RecordingChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_document(&self, file_id: &str, data: &[u8]) {
        self.documents
            .lock()
            .unwrap()
            .insert(file_id.to_string(), data.to_vec());
    }

    /// Refuse every message containing `needle`, the way Telegram refuses
    /// malformed MarkdownV2.
    pub fn reject_containing(&self, needle: &str) {
        self.rejected.lock().unwrap().push(needle.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|s| s.text).collect()
    }

    /// Everything sent since the last call.
    pub fn drain(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .drain(..)
            .map(|s| s.text)
            .collect()
    }

    pub fn last_text(&self) -> String {
        self.sent().last().map(|s| s.text.clone()).unwrap_or_default()
    }

    pub fn saw(&self, needle: &str) -> bool {
        self.sent().iter().any(|s| s.text.contains(needle))
    }
}

impl Channel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    fn send<'a>(
        &'a self,
        message: &'a OutboundMessage,
        recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let rejected = self
                .rejected
                .lock()
                .unwrap()
                .iter()
                .any(|needle| message.text.contains(needle.as_str()));
            if rejected {
                anyhow::bail!("Bad Request: can't parse entities");
            }
            self.sent.lock().unwrap().push(Sent {
                chat_id: recipient,
                text: message.text.clone(),
                format: message.format,
            });
            Ok(())
        })
    }

    fn listen<'a>(
        &'a self,
        _tx: tokio::sync::mpsc::Sender<InboundEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(std::future::pending())
    }

    fn send_activity<'a>(
        &'a self,
        _recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.activity.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }

    fn download_document<'a>(
        &'a self,
        document: &'a DocumentRef,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            self.documents
                .lock()
                .unwrap()
                .get(&document.file_id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("file {} expired", document.file_id))
        })
    }
}

/// Thought store whose commits fail while `failing` is set; reads pass
/// through to the wrapped store.
pub struct FlakyThoughts {
    inner: SqliteStore,
    pub failing: std::sync::atomic::AtomicBool,
}

impl FlakyThoughts {
    pub fn new(inner: SqliteStore) -> Arc<Self> {
        Arc::new(Self {
            inner,
            failing: std::sync::atomic::AtomicBool::new(true),
        })
    }
}

impl ThoughtStore for FlakyThoughts {
    fn commit<'a>(
        &'a self,
        thought: NewThought,
        outputs: Vec<NewOutput>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<i64>> + Send + 'a>> {
        Box::pin(async move {
            if self.failing.load(Ordering::SeqCst) {
                anyhow::bail!("database is locked");
            }
            self.inner.commit(thought, outputs).await
        })
    }

    fn thought_with_outputs<'a>(
        &'a self,
        id: i64,
        actor: ActorId,
    ) -> Pin<
        Box<
            dyn Future<Output = anyhow::Result<Option<(ThoughtRecord, Vec<OutputRecord>)>>>
                + Send
                + 'a,
        >,
    > {
        self.inner.thought_with_outputs(id, actor)
    }

    fn recent_thoughts<'a>(
        &'a self,
        actor: ActorId,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<ThoughtRecord>>> + Send + 'a>> {
        self.inner.recent_thoughts(actor, limit)
    }

    fn count_thoughts<'a>(
        &'a self,
        actor: ActorId,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<u64>> + Send + 'a>> {
        self.inner.count_thoughts(actor)
    }
}

/// Sink that only remembers what it was handed.
#[derive(Default)]
pub struct CollectingSink {
    pub reports: Mutex<Vec<RunReport>>,
}

impl RunSink for CollectingSink {
    fn deliver<'a>(
        &'a self,
        report: &'a RunReport,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            self.reports.lock().unwrap().push(report.clone());
            Ok(())
        })
    }
}

pub fn settings() -> WorkerSettings {
    WorkerSettings {
        max_upload_bytes: 20 * 1024 * 1024,
        activity_interval: Duration::ZERO,
        eviction_interval: Duration::from_secs(300),
    }
}

pub fn generous_limiter() -> RateLimiter {
    let policy = RatePolicy {
        window: Duration::from_secs(60),
        max_events: 100,
    };
    RateLimiter::new(policy, policy)
}

/// A worker wired to in-memory doubles, with `ACTOR` as the only
/// authorized user.
pub struct Bot {
    pub worker: Worker,
    pub channel: Arc<RecordingChannel>,
    pub provider: Arc<ScriptedProvider>,
    pub store: SqliteStore,
}

impl Bot {
    pub async fn new() -> Self {
        Self::with_limiter(generous_limiter()).await
    }

    pub async fn with_limiter(limiter: RateLimiter) -> Self {
        let store = SqliteStore::in_memory().await.unwrap();
        Self::build(store.clone(), Arc::new(store), limiter)
    }

    pub fn build(
        store: SqliteStore,
        thoughts: Arc<dyn ThoughtStore>,
        limiter: RateLimiter,
    ) -> Self {
        let channel = RecordingChannel::new();
        let provider = ScriptedProvider::new();
        let shared = Arc::new(store.clone());
        let worker = Worker::new(
            WorkerDeps {
                channel: channel.clone(),
                provider: provider.clone(),
                messages: shared.clone() as Arc<dyn MessageStore>,
                tags: shared as Arc<dyn TagStore>,
                thoughts,
                authorizer: Arc::new(|actor: ActorId| actor == ACTOR),
                limiter: Arc::new(limiter),
            },
            settings(),
        )
        .unwrap();
        Self {
            worker,
            channel,
            provider,
            store,
        }
    }

    pub async fn send_as(&mut self, actor: ActorId, payload: InboundPayload) {
        let event = InboundEvent {
            actor,
            conversation: CHAT,
            message_id: Some(1),
            received_at: chrono::Utc::now(),
            payload,
        };
        self.worker.handle(event).await;
    }

    pub async fn text(&mut self, text: &str) {
        self.send_as(ACTOR, InboundPayload::from_text(text)).await;
    }

    pub async fn upload(&mut self, file_id: &str, file_name: &str, data: &[u8]) {
        self.channel.add_document(file_id, data);
        self.send_as(
            ACTOR,
            InboundPayload::Document(DocumentRef {
                file_id: file_id.to_string(),
                file_name: Some(file_name.to_string()),
                size: Some(data.len() as u64),
            }),
        )
        .await;
    }

    pub fn mode(&self) -> &'static str {
        self.worker.session(key()).mode()
    }

    pub async fn pending_notes(&self) -> Vec<String> {
        use media_leverage::store::TimeBound;
        let epoch = chrono::DateTime::<chrono::Utc>::UNIX_EPOCH;
        self.store
            .messages_since(key(), TimeBound::Inclusive(epoch))
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.text)
            .collect()
    }

    pub async fn thought_count(&self) -> u64 {
        self.store.count_thoughts(ACTOR).await.unwrap()
    }
}
