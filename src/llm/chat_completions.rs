//! Wire format shared by OpenAI-compatible backends (OpenAI, custom
//! endpoints and Copilot).

use super::scrub::api_error;
use super::types::{ProviderMessage, ProviderResponse, ProviderSettings};
use crate::error::LlmError;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub(in crate::llm) struct ChatRequest<'a> {
    pub(in crate::llm) model: &'a str,
    pub(in crate::llm) messages: Vec<Message<'a>>,
    pub(in crate::llm) max_tokens: u32,
    pub(in crate::llm) temperature: f64,
}

#[derive(Debug, Serialize)]
pub(in crate::llm) struct Message<'a> {
    pub(in crate::llm) role: &'static str,
    pub(in crate::llm) content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(in crate::llm) struct ChatResponse {
    pub(in crate::llm) choices: Vec<Choice>,
    pub(in crate::llm) usage: Option<Usage>,
    pub(in crate::llm) model: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::llm) struct Usage {
    #[serde(default)]
    pub(in crate::llm) prompt_tokens: u64,
    #[serde(default)]
    pub(in crate::llm) completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
pub(in crate::llm) struct Choice {
    pub(in crate::llm) message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(in crate::llm) struct ResponseMessage {
    pub(in crate::llm) content: Option<String>,
}

/// System instruction first, then the conversation in order.
pub(in crate::llm) fn build_request<'a>(
    settings: &'a ProviderSettings,
    system: &'a str,
    messages: &'a [ProviderMessage],
    max_tokens: u32,
) -> ChatRequest<'a> {
    let mut wire = Vec::with_capacity(messages.len() + 1);
    wire.push(Message {
        role: "system",
        content: system,
    });
    wire.extend(messages.iter().map(|m| Message {
        role: m.role.as_str(),
        content: &m.content,
    }));

    ChatRequest {
        model: &settings.model,
        messages: wire,
        max_tokens,
        temperature: settings.temperature,
    }
}

/// Send a prepared request and map the first choice into a response.
pub(in crate::llm) async fn send(
    provider: &str,
    request: RequestBuilder,
    body: &ChatRequest<'_>,
) -> anyhow::Result<ProviderResponse> {
    let response = request.json(body).send().await?;
    if !response.status().is_success() {
        return Err(api_error(provider, response).await);
    }

    let chat: ChatResponse = response.json().await.map_err(anyhow::Error::msg)?;
    let text = chat
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| LlmError::EmptyResponse {
            provider: provider.to_string(),
        })?;

    let mut result = match chat.usage {
        Some(usage) => {
            ProviderResponse::with_usage(text, usage.prompt_tokens, usage.completion_tokens)
        }
        None => ProviderResponse::text_only(text),
    };
    if let Some(model) = chat.model {
        result = result.with_model(model);
    }
    Ok(result)
}
