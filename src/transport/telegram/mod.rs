pub mod api;
#[cfg(feature = "webhook")]
pub mod webhook;


use self::api::{ApiResponse, BotCommand, BotUser, File, Update};
use crate::config::TelegramConfig;
use crate::error::TransportError;
use crate::llm::{http_client::build_provider_client_with_timeout, sanitize_api_error};
use crate::transport::traits::{Channel, DocumentRef, InboundEvent, OutboundMessage, TextFormat};
use anyhow::Context;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

pub const API_BASE: &str = "https://api.telegram.org";
pub const MAX_MESSAGE_LENGTH: usize = 4096;
const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Webhook endpoint settings; absent means long polling.
#[derive(Debug, Clone)]
pub struct WebhookSettings {
    pub url: String,
    pub secret: Option<String>,
    pub listen: String,
    pub port: u16,
}

/// Telegram Bot API channel, receiving through long polling or a webhook.
pub struct TelegramChannel {
    bot_token: String,
    api_base: String,
    client: reqwest::Client,
    webhook: Option<WebhookSettings>,
    max_upload_bytes: u64,
}

impl TelegramChannel {
    pub fn new(config: &TelegramConfig) -> Self {
        let webhook = config.webhook_url().map(|url| WebhookSettings {
            url: url.to_string(),
            secret: config
                .webhook_secret
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToString::to_string),
            listen: config.webhook_listen.clone(),
            port: config.webhook_port,
        });
        Self::with_api_base(&config.bot_token, API_BASE, webhook, config.max_upload_bytes)
    }

    pub fn with_api_base(
        bot_token: &str,
        api_base: &str,
        webhook: Option<WebhookSettings>,
        max_upload_bytes: u64,
    ) -> Self {
        Self {
            bot_token: bot_token.trim().to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            // Long polls hold the request open for POLL_TIMEOUT_SECS.
            client: build_provider_client_with_timeout(POLL_TIMEOUT_SECS + 15),
            webhook,
            max_upload_bytes,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.api_base, self.bot_token)
    }

    /// Call a Bot API method and unwrap its `result`.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &serde_json::Value,
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(reqwest::Error::without_url)
            .with_context(|| format!("telegram {method} request"))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("read telegram {method} response"))?;
        let parsed: ApiResponse<T> = serde_json::from_str(&text).map_err(|_| TransportError::Api {
            channel: "telegram".into(),
            message: format!("{method} returned {status}: {}", sanitize_api_error(&text)),
        })?;

        match parsed {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse { description, .. } => Err(TransportError::Api {
                channel: "telegram".into(),
                message: format!(
                    "{method} failed ({status}): {}",
                    sanitize_api_error(description.as_deref().unwrap_or("no description"))
                ),
            }
            .into()),
        }
    }

    pub async fn get_me(&self) -> anyhow::Result<BotUser> {
        self.call("getMe", &serde_json::json!({})).await
    }

    pub async fn poll_updates(&self, offset: i64) -> anyhow::Result<Vec<Update>> {
        self.call(
            "getUpdates",
            &serde_json::json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn delete_webhook(&self) -> anyhow::Result<()> {
        let _: bool = self
            .call(
                "deleteWebhook",
                &serde_json::json!({ "drop_pending_updates": true }),
            )
            .await?;
        Ok(())
    }

    pub async fn set_webhook(&self, settings: &WebhookSettings) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "url": settings.url,
            "drop_pending_updates": true,
            "allowed_updates": ["message"],
        });
        if let Some(secret) = &settings.secret {
            body["secret_token"] = serde_json::Value::String(secret.clone());
        }
        let _: bool = self.call("setWebhook", &body).await?;
        Ok(())
    }

    async fn long_poll(&self, tx: tokio::sync::mpsc::Sender<InboundEvent>) -> anyhow::Result<()> {
        self.delete_webhook()
            .await
            .context("clear webhook before polling")?;
        tracing::info!("telegram listening via long polling");

        let mut offset = 0_i64;
        loop {
            let updates = match self.poll_updates(offset).await {
                Ok(updates) => updates,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "telegram poll failed");
                    tokio::time::sleep(POLL_ERROR_BACKOFF).await;
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                let Some(event) = update.into_event() else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    return Ok(());
                }
            }
        }
    }

    async fn send_chunk(&self, text: &str, format: TextFormat, chat_id: i64) -> anyhow::Result<()> {
        let mut body = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "link_preview_options": {"is_disabled": true},
        });
        if format == TextFormat::MarkdownV2 {
            body["parse_mode"] = serde_json::Value::String("MarkdownV2".into());
        }
        let _: serde_json::Value = self.call("sendMessage", &body).await.map_err(|e| {
            TransportError::Send {
                channel: "telegram".into(),
                message: format!("{e:#}"),
            }
        })?;
        Ok(())
    }
}

/// Split on line boundaries so that no chunk exceeds `limit` characters.
/// A single over-long line is hard-split.
pub(crate) fn chunk_text(text: &str, limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;
    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if current_len + line_len > limit && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len > limit {
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }
        current.push_str(line);
        current_len += line_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    fn max_message_length(&self) -> usize {
        MAX_MESSAGE_LENGTH
    }

    fn send<'a>(
        &'a self,
        message: &'a OutboundMessage,
        recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            for chunk in chunk_text(&message.text, MAX_MESSAGE_LENGTH) {
                self.send_chunk(&chunk, message.format, recipient).await?;
            }
            Ok(())
        })
    }

    fn listen<'a>(
        &'a self,
        tx: tokio::sync::mpsc::Sender<InboundEvent>,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            match &self.webhook {
                #[cfg(feature = "webhook")]
                Some(settings) => {
                    self.set_webhook(settings).await.context("register webhook")?;
                    webhook::serve(settings, tx).await
                }
                #[cfg(not(feature = "webhook"))]
                Some(_) => anyhow::bail!("webhook_url is set but the webhook feature is disabled"),
                None => self.long_poll(tx).await,
            }
        })
    }

    fn health_check<'a>(&'a self) -> Pin<Box<dyn Future<Output = bool> + Send + 'a>> {
        Box::pin(async move { self.get_me().await.is_ok() })
    }

    fn send_activity<'a>(
        &'a self,
        recipient: i64,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let _: bool = self
                .call(
                    "sendChatAction",
                    &serde_json::json!({ "chat_id": recipient, "action": "typing" }),
                )
                .await?;
            Ok(())
        })
    }

    fn download_document<'a>(
        &'a self,
        document: &'a DocumentRef,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Vec<u8>>> + Send + 'a>> {
        Box::pin(async move {
            let download_failed = |message: String| TransportError::Download {
                channel: "telegram".into(),
                message,
            };

            let file: File = self
                .call("getFile", &serde_json::json!({ "file_id": document.file_id }))
                .await?;
            let size = file.file_size.or(document.size).unwrap_or(0);
            if size > self.max_upload_bytes {
                return Err(download_failed(format!(
                    "file is {size} bytes; limit is {}",
                    self.max_upload_bytes
                ))
                .into());
            }
            let path = file
                .file_path
                .ok_or_else(|| download_failed("getFile returned no file_path".into()))?;

            let response = self
                .client
                .get(self.file_url(&path))
                .send()
                .await
                .map_err(reqwest::Error::without_url)
                .context("download telegram file")?;
            if !response.status().is_success() {
                return Err(download_failed(format!("HTTP {}", response.status())).into());
            }
            let bytes = response
                .bytes()
                .await
                .map_err(reqwest::Error::without_url)
                .context("read telegram file body")?;
            Ok(bytes.to_vec())
        })
    }

    fn register_commands<'a>(
        &'a self,
        commands: &'a [(&'static str, String)],
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let commands: Vec<BotCommand<'_>> = commands
                .iter()
                .map(|(command, description)| BotCommand {
                    command,
                    description,
                })
                .collect();
            let _: bool = self
                .call("setMyCommands", &serde_json::json!({ "commands": commands }))
                .await?;
            Ok(())
        })
    }
}
