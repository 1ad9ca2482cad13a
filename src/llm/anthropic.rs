use super::http_client::build_provider_client_with_timeout;
use super::scrub::api_error;
use super::traits::Provider;
use super::types::{ProviderMessage, ProviderResponse, ProviderSettings};
use crate::error::LlmError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

pub struct AnthropicProvider {
    /// Pre-computed auth: `("Authorization", "Bearer <token>")` or `("x-api-key", "<key>")`.
    cached_auth: Option<(&'static str, String)>,
    cached_messages_url: String,
    settings: ProviderSettings,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    system: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f64,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    content: Vec<ResponseContentBlock>,
    usage: Option<Usage>,
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Unsupported,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<&str>, settings: ProviderSettings) -> Self {
        Self::with_base_url(api_key, None, settings)
    }

    pub fn with_base_url(
        api_key: Option<&str>,
        base_url: Option<&str>,
        settings: ProviderSettings,
    ) -> Self {
        let base = base_url
            .map_or(DEFAULT_BASE_URL, |u| u.trim_end_matches('/'))
            .to_string();
        let cached_auth = api_key.map(str::trim).filter(|k| !k.is_empty()).map(|k| {
            if Self::is_setup_token(k) {
                ("Authorization", format!("Bearer {k}"))
            } else {
                ("x-api-key", k.to_string())
            }
        });
        Self {
            cached_auth,
            cached_messages_url: format!("{base}/v1/messages"),
            client: build_provider_client_with_timeout(settings.timeout_secs),
            settings,
        }
    }

    fn is_setup_token(token: &str) -> bool {
        token.starts_with("sk-ant-oat01-")
    }

    fn extract_text(response: &ChatResponse) -> Option<String> {
        let text = response
            .content
            .iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text.as_str()),
                ResponseContentBlock::Unsupported => None,
            })
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() { None } else { Some(text) }
    }

    async fn call_api(&self, request: &ChatRequest<'_>) -> anyhow::Result<ChatResponse> {
        let (auth_name, auth_value) = self.cached_auth.as_ref().ok_or_else(|| LlmError::Auth {
            provider: "anthropic".into(),
        })?;

        let response = self
            .client
            .post(&self.cached_messages_url)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .header(*auth_name, auth_value)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error("Anthropic", response).await);
        }

        response.json().await.map_err(anyhow::Error::msg)
    }
}

impl Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    fn converse<'a>(
        &'a self,
        system: &'a str,
        messages: &'a [ProviderMessage],
        max_tokens: u32,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<ProviderResponse>> + Send + 'a>> {
        Box::pin(async move {
            let request = ChatRequest {
                model: &self.settings.model,
                max_tokens,
                system,
                messages: messages
                    .iter()
                    .map(|m| Message {
                        role: m.role.as_str(),
                        content: &m.content,
                    })
                    .collect(),
                temperature: self.settings.temperature,
            };
            let chat_response = self.call_api(&request).await?;
            let text = Self::extract_text(&chat_response).ok_or_else(|| LlmError::EmptyResponse {
                provider: "anthropic".into(),
            })?;

            let mut response = match chat_response.usage {
                Some(usage) => {
                    ProviderResponse::with_usage(text, usage.input_tokens, usage.output_tokens)
                }
                None => ProviderResponse::text_only(text),
            };
            if let Some(model) = chat_response.model {
                response = response.with_model(model);
            }
            Ok(response)
        })
    }
}
