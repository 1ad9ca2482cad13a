//! The single worker that owns every conversation's mode.
//!
//! Inbound events are handled strictly one at a time in arrival order, so
//! the session map, the window tables and the rate limiter never see two
//! concurrent writers for the same conversation.

use super::commands::BotCommand;
use super::format;
use super::sink::{ChannelSink, typing_guard};
use crate::config::Config;
use crate::core::{
    ChatSession, ConversationKey, Effect, Hint, MessageWindow, PipelineOrchestrator, RunOutcome,
    RunReport, RunRequest, Session, SessionEvent, SourceKind, Transition, WindowBound,
};
use crate::error::PipelineError;
use crate::llm::Provider;
use crate::media::{DocumentFormat, extract_text};
use crate::prompt::{CHAT_MAX_TOKENS, PromptBook};
use crate::security::{ActionKind, Authorizer, RateLimited, RateLimiter};
use crate::store::{MessageStore, TagStore, ThoughtStore};
use crate::transport::{Channel, InboundEvent, InboundPayload, OutboundMessage};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::Receiver;
use tracing::Instrument;

pub const HISTORY_LIMIT: usize = 10;
const DEFAULT_FILE_NAME: &str = "upload.txt";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// Collaborators the worker is built from.
pub struct WorkerDeps {
    pub channel: Arc<dyn Channel>,
    pub provider: Arc<dyn Provider>,
    pub messages: Arc<dyn MessageStore>,
    pub tags: Arc<dyn TagStore>,
    pub thoughts: Arc<dyn ThoughtStore>,
    pub authorizer: Arc<dyn Authorizer>,
    pub limiter: Arc<RateLimiter>,
}

#[derive(Debug, Clone, Copy)]
pub struct WorkerSettings {
    pub max_upload_bytes: u64,
    /// Zero disables the typing indicator.
    pub activity_interval: Duration,
    pub eviction_interval: Duration,
}

impl WorkerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_upload_bytes: config.telegram.max_upload_bytes,
            activity_interval: Duration::from_secs(config.telegram.activity_interval_secs),
            eviction_interval: Duration::from_secs(config.rate_limit.eviction_interval_secs),
        }
    }
}

pub struct Worker {
    channel: Arc<dyn Channel>,
    provider: Arc<dyn Provider>,
    thoughts: Arc<dyn ThoughtStore>,
    authorizer: Arc<dyn Authorizer>,
    limiter: Arc<RateLimiter>,
    window: MessageWindow,
    orchestrator: PipelineOrchestrator,
    prompts: Arc<PromptBook>,
    settings: WorkerSettings,
    sessions: HashMap<ConversationKey, Session>,
}

impl Worker {
    pub fn new(deps: WorkerDeps, settings: WorkerSettings) -> anyhow::Result<Self> {
        let prompts = Arc::new(PromptBook::new()?);
        let window = MessageWindow::new(deps.messages, deps.tags);
        let orchestrator = PipelineOrchestrator::new(
            Arc::clone(&deps.provider),
            Arc::clone(&deps.thoughts),
            window.clone(),
            Arc::clone(&prompts),
        );
        Ok(Self {
            channel: deps.channel,
            provider: deps.provider,
            thoughts: deps.thoughts,
            authorizer: deps.authorizer,
            limiter: deps.limiter,
            window,
            orchestrator,
            prompts,
            settings,
            sessions: HashMap::new(),
        })
    }

    /// Current mode of a conversation; absent entries are idle.
    pub fn session(&self, key: ConversationKey) -> Session {
        self.sessions.get(&key).cloned().unwrap_or_default()
    }

    /// Consume events until every sender is dropped, sweeping idle rate
    /// limit buckets on the configured interval.
    pub async fn run(mut self, mut rx: Receiver<InboundEvent>) {
        let period = self.settings.eviction_interval.max(Duration::from_secs(1));
        let mut eviction = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        eviction.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                _ = eviction.tick() => {
                    let evicted = self.limiter.evict_idle(Instant::now());
                    if evicted > 0 {
                        tracing::debug!(evicted, "idle rate limit buckets evicted");
                    }
                }
            }
        }
        tracing::info!("inbound queue closed; worker stopped");
    }

    pub async fn handle(&mut self, event: InboundEvent) {
        let span = tracing::debug_span!(
            "inbound",
            actor = event.actor,
            chat = event.conversation,
            message_id = event.message_id,
        );
        async {
            if let Err(e) = self.dispatch(&event).await {
                tracing::error!(error = %format!("{e:#}"), "event handling failed");
                self.reply(event.conversation, t!("bot.generic_error")).await;
            }
        }
        .instrument(span)
        .await;
    }

    /// Commands answered before the authorization check.
    async fn open_command(&self, command: &BotCommand, event: &InboundEvent) {
        let chat_id = event.conversation;
        match command {
            BotCommand::Help => self.reply(chat_id, t!("bot.help")).await,
            BotCommand::WhoAmI => {
                let status = if self.authorizer.is_authorized(event.actor).await {
                    t!("bot.authorized")
                } else {
                    t!("bot.not_authorized")
                };
                self.reply(chat_id, t!("bot.whoami", id = event.actor, status = status))
                    .await;
            }
            _ => self.reply(chat_id, t!("bot.welcome")).await,
        }
    }

    async fn dispatch(&mut self, event: &InboundEvent) -> anyhow::Result<()> {
        let command = match &event.payload {
            InboundPayload::Command { name, args } => BotCommand::parse(name, args),
            _ => None,
        };
        let chat_id = event.conversation;

        if let Some(open) = command.as_ref().filter(|c| c.is_open()) {
            self.open_command(open, event).await;
            return Ok(());
        }

        if !self.authorize(event).await {
            return Ok(());
        }

        let session_event = match command {
            Some(BotCommand::Status) => return self.status(event).await,
            Some(BotCommand::History) => return self.history(event).await,
            Some(BotCommand::Show { id }) => return self.show(event, &id).await,
            Some(BotCommand::Process) => SessionEvent::EnterProcessMode,
            Some(BotCommand::Chat) => SessionEvent::EnterChatMode { at: Utc::now() },
            Some(BotCommand::Tag { label }) => SessionEvent::PlaceMarker { label },
            Some(BotCommand::Analyze) => SessionEvent::RunPipeline,
            Some(BotCommand::Cancel) => SessionEvent::Cancel,
            Some(BotCommand::Start | BotCommand::Help | BotCommand::WhoAmI) => return Ok(()),
            None => match &event.payload {
                InboundPayload::Text(text) => SessionEvent::Text(text.clone()),
                InboundPayload::Document(_) => SessionEvent::Document,
                InboundPayload::Unsupported => SessionEvent::Unsupported,
                InboundPayload::Command { name, .. } => {
                    tracing::debug!(command = %name, "unknown command");
                    self.reply(chat_id, t!("bot.unknown_command")).await;
                    return Ok(());
                }
            },
        };

        self.transition(event, session_event).await;
        Ok(())
    }

    async fn authorize(&self, event: &InboundEvent) -> bool {
        if self.authorizer.is_authorized(event.actor).await {
            return true;
        }
        tracing::info!(actor = event.actor, "unauthorized request denied");
        self.reply(event.conversation, t!("bot.unauthorized", id = event.actor))
            .await;
        false
    }

    async fn transition(&mut self, event: &InboundEvent, session_event: SessionEvent) {
        let key = event.key();
        let current = self.sessions.remove(&key).unwrap_or_default();
        let from = current.mode();
        let Transition { mut next, effects } = current.apply(session_event);

        for effect in effects {
            if let Some(outcome) = self.execute(event, &mut next, effect).await {
                next = next.settle(outcome);
            }
        }

        tracing::debug!(from, to = next.mode(), "session transition");
        if !matches!(next, Session::Idle) {
            self.sessions.insert(key, next);
        }
    }

    /// Run one effect. Pipeline-triggering effects report how they resolved.
    async fn execute(
        &self,
        event: &InboundEvent,
        next: &mut Session,
        effect: Effect,
    ) -> Option<RunOutcome> {
        let key = event.key();
        let chat_id = event.conversation;

        match effect {
            Effect::DiscardChat { started_at } => {
                if let Err(e) = self.window.discard_session(key, started_at).await {
                    tracing::error!(error = %format!("{e:#}"), "discarding chat session failed");
                }
            }
            Effect::PromptForContent => {
                let limit = self.settings.max_upload_bytes / BYTES_PER_MB;
                self.reply(chat_id, t!("bot.process_prompt", limit = limit))
                    .await;
            }
            Effect::ChatStarted => self.reply(chat_id, t!("bot.chat_started")).await,
            Effect::PlaceTag { label } => {
                match self.window.place_tag(key, label.as_deref(), Utc::now()).await {
                    Ok(tag) => {
                        tracing::debug!(tag_id = tag.id, "tag placed");
                        let label = quoted_label(tag.label.as_deref());
                        self.reply(chat_id, t!("bot.tag_placed", label = label)).await;
                    }
                    Err(e) => {
                        tracing::error!(error = %format!("{e:#}"), "placing tag failed");
                        self.reply(chat_id, t!("bot.generic_error")).await;
                    }
                }
            }
            Effect::Analyze { chat_started_at } => {
                return Some(self.analyze(event, chat_started_at).await);
            }
            Effect::SubmitText(text) => return Some(self.submit_text(event, &text).await),
            Effect::SubmitDocument => return Some(self.submit_document(event).await),
            Effect::ChatTurn(text) => {
                if let Some(chat) = next.chat_mut() {
                    self.chat_turn(event, chat, &text).await;
                }
            }
            Effect::Accumulate(text) => {
                let text = text.trim();
                if !text.is_empty()
                    && let Err(e) = self
                        .window
                        .accumulate(key, event.message_id, text, Utc::now())
                        .await
                {
                    tracing::error!(error = %format!("{e:#}"), "storing message failed");
                    self.reply(chat_id, t!("bot.generic_error")).await;
                }
            }
            Effect::Cancelled => self.reply(chat_id, t!("bot.cancelled")).await,
            Effect::Hint(hint) => {
                let text = match hint {
                    Hint::SendContent => t!("bot.send_content"),
                    Hint::FilesNeedProcess => t!("bot.files_need_process"),
                    Hint::AlreadyChatting => t!("bot.already_chatting"),
                };
                self.reply(chat_id, text).await;
            }
        }
        None
    }

    async fn analyze(
        &self,
        event: &InboundEvent,
        chat_started_at: Option<chrono::DateTime<Utc>>,
    ) -> RunOutcome {
        let chat_id = event.conversation;
        let window = match self
            .window
            .resolve(event.key(), chat_started_at, Utc::now())
            .await
        {
            Ok(window) => window,
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "resolving window failed");
                self.reply(chat_id, t!("bot.pipeline_failed")).await;
                return RunOutcome::Declined;
            }
        };

        let source = describe_source(&window.bound);
        if window.is_empty() {
            self.reply(chat_id, t!("bot.analyze_empty", source = source))
                .await;
            return RunOutcome::Declined;
        }
        if let Err(limited) = self.limiter.check(event.actor, ActionKind::Pipeline) {
            self.deny_rate_limited(chat_id, limited).await;
            return RunOutcome::Declined;
        }

        self.reply(
            chat_id,
            t!("bot.analyze_reading", count = window.len(), source = source),
        )
        .await;
        match self.run_pipeline(chat_id, RunRequest::from_window(window)).await {
            Ok(_) => RunOutcome::Committed,
            Err(_) => {
                self.reply(chat_id, t!("bot.analyze_retained")).await;
                RunOutcome::Failed
            }
        }
    }

    async fn submit_text(&self, event: &InboundEvent, text: &str) -> RunOutcome {
        let chat_id = event.conversation;
        let content = text.trim();
        if content.is_empty() {
            self.reply(chat_id, t!("bot.content_empty")).await;
            return RunOutcome::Declined;
        }
        self.submit(event, SourceKind::Text, content).await
    }

    async fn submit_document(&self, event: &InboundEvent) -> RunOutcome {
        let chat_id = event.conversation;
        let InboundPayload::Document(document) = &event.payload else {
            self.reply(chat_id, t!("bot.send_content")).await;
            return RunOutcome::Declined;
        };
        let name = document
            .file_name
            .clone()
            .unwrap_or_else(|| DEFAULT_FILE_NAME.to_string());

        if document
            .size
            .is_some_and(|size| size > self.settings.max_upload_bytes)
        {
            let limit = self.settings.max_upload_bytes / BYTES_PER_MB;
            self.reply(chat_id, t!("bot.file_too_large", limit = limit))
                .await;
            return RunOutcome::Declined;
        }
        if let Err(e) = DocumentFormat::from_file_name(&name) {
            self.reply(chat_id, t!("bot.file_rejected", reason = e)).await;
            return RunOutcome::Declined;
        }

        self.reply(chat_id, t!("bot.file_parsing", name = name)).await;
        let data = match self.channel.download_document(document).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(file = %name, error = %format!("{e:#}"), "document download failed");
                self.reply(chat_id, t!("bot.file_failed")).await;
                return RunOutcome::Declined;
            }
        };
        let content = match extract_text(&data, &name) {
            Ok(content) => content,
            Err(e) => {
                tracing::info!(file = %name, error = %e, "document rejected");
                self.reply(chat_id, t!("bot.file_rejected", reason = e)).await;
                return RunOutcome::Declined;
            }
        };
        if content.trim().is_empty() {
            self.reply(chat_id, t!("bot.content_empty")).await;
            return RunOutcome::Declined;
        }
        self.submit(event, SourceKind::File, &content).await
    }

    async fn submit(&self, event: &InboundEvent, source: SourceKind, content: &str) -> RunOutcome {
        let chat_id = event.conversation;
        if let Err(limited) = self.limiter.check(event.actor, ActionKind::Pipeline) {
            self.deny_rate_limited(chat_id, limited).await;
            return RunOutcome::Declined;
        }
        self.reply(chat_id, t!("bot.analyzing")).await;
        let request = RunRequest::submission(event.actor, source, content);
        match self.run_pipeline(chat_id, request).await {
            Ok(_) => RunOutcome::Committed,
            Err(_) => {
                self.reply(chat_id, t!("bot.pipeline_failed")).await;
                RunOutcome::Failed
            }
        }
    }

    async fn run_pipeline(
        &self,
        chat_id: i64,
        request: RunRequest,
    ) -> Result<RunReport, PipelineError> {
        let sink = ChannelSink::new(
            Arc::clone(&self.channel),
            chat_id,
            self.settings.activity_interval,
        );
        self.orchestrator.run(request, &sink).await
    }

    async fn chat_turn(&self, event: &InboundEvent, chat: &mut ChatSession, text: &str) {
        let chat_id = event.conversation;
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Err(limited) = self.limiter.check(event.actor, ActionKind::ChatTurn) {
            self.deny_rate_limited(chat_id, limited).await;
            return;
        }

        // Persisted first so the session window holds the turn even when
        // the reply fails.
        if let Err(e) = self
            .window
            .accumulate(
                event.key(),
                event.message_id,
                &format!("User: {text}"),
                Utc::now(),
            )
            .await
        {
            tracing::error!(error = %format!("{e:#}"), "storing chat turn failed");
            self.reply(chat_id, t!("bot.chat_failed")).await;
            return;
        }

        let transcript = chat.transcript_with(text);
        let response = {
            let _typing = typing_guard(&self.channel, chat_id, self.settings.activity_interval);
            self.provider
                .converse(self.prompts.chat_system(), &transcript, CHAT_MAX_TOKENS)
                .await
        };
        let reply = match response {
            Ok(response) if !response.text.trim().is_empty() => response.text.trim().to_string(),
            Ok(_) => {
                tracing::warn!("chat backend returned an empty reply");
                self.reply(chat_id, t!("bot.chat_failed")).await;
                return;
            }
            Err(e) => {
                tracing::error!(error = %format!("{e:#}"), "chat backend call failed");
                self.reply(chat_id, t!("bot.chat_failed")).await;
                return;
            }
        };

        self.reply(chat_id, reply.as_str()).await;
        if let Err(e) = self
            .window
            .accumulate(
                event.key(),
                None,
                &format!("Assistant: {reply}"),
                Utc::now(),
            )
            .await
        {
            tracing::error!(error = %format!("{e:#}"), "storing chat reply failed");
        }
        chat.record_exchange(text, &reply);
    }

    async fn status(&self, event: &InboundEvent) -> anyhow::Result<()> {
        let records = self.thoughts.count_thoughts(event.actor).await?;
        let text = t!(
            "bot.status",
            provider = self.provider.name(),
            model = self.provider.model(),
            records = records,
            access = t!("bot.authorized")
        );
        self.reply(event.conversation, text).await;
        Ok(())
    }

    async fn history(&self, event: &InboundEvent) -> anyhow::Result<()> {
        let records = self
            .thoughts
            .recent_thoughts(event.actor, HISTORY_LIMIT)
            .await?;
        self.reply_markdown(event.conversation, format::history(&records))
            .await;
        Ok(())
    }

    async fn show(&self, event: &InboundEvent, raw_id: &str) -> anyhow::Result<()> {
        let chat_id = event.conversation;
        if raw_id.is_empty() {
            self.reply(chat_id, t!("bot.show_usage")).await;
            return Ok(());
        }
        let Ok(id) = raw_id.parse::<i64>() else {
            self.reply(chat_id, t!("bot.show_bad_id")).await;
            return Ok(());
        };

        match self.thoughts.thought_with_outputs(id, event.actor).await? {
            Some((thought, outputs)) => {
                for message in format::full_record(&thought, &outputs) {
                    self.reply_markdown(chat_id, message).await;
                }
            }
            None => {
                self.reply(chat_id, t!("bot.show_not_found", id = id)).await;
            }
        }
        Ok(())
    }

    async fn deny_rate_limited(&self, chat_id: i64, limited: RateLimited) {
        tracing::info!(
            kind = %limited.kind,
            retry_after_secs = limited.retry_after_secs,
            "rate limited"
        );
        self.reply(
            chat_id,
            t!("bot.rate_limited", secs = limited.retry_after_secs),
        )
        .await;
    }

    async fn reply(&self, chat_id: i64, text: impl Into<String>) {
        self.send(chat_id, OutboundMessage::plain(text)).await;
    }

    async fn reply_markdown(&self, chat_id: i64, text: impl Into<String>) {
        self.send(chat_id, OutboundMessage::markdown(text)).await;
    }

    /// Replies are best effort; a failed send never changes session state.
    async fn send(&self, chat_id: i64, message: OutboundMessage) {
        if let Err(e) = self.channel.send(&message, chat_id).await {
            tracing::warn!(
                channel = self.channel.name(),
                chat_id,
                error = %format!("{e:#}"),
                "reply failed"
            );
        }
    }
}

fn quoted_label(label: Option<&str>) -> String {
    match label {
        Some(label) => format!("\"{label}\""),
        None => t!("bot.no_label").to_string(),
    }
}

fn describe_source(bound: &WindowBound) -> String {
    match bound {
        WindowBound::ChatSession { .. } => t!("bot.source_chat").to_string(),
        WindowBound::Tag(tag) => {
            t!("bot.source_tag", label = quoted_label(tag.label.as_deref())).to_string()
        }
        WindowBound::Day { .. } => t!("bot.source_day").to_string(),
    }
}
