use super::chat_completions::{build_request, send};
use super::http_client::build_provider_client_with_timeout;
use super::traits::Provider;
use super::types::{ProviderMessage, ProviderResponse, ProviderSettings};
use crate::error::LlmError;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat Completions client for OpenAI and any compatible endpoint.
pub struct OpenAiProvider {
    name: String,
    /// Pre-computed `"Bearer <key>"` header value.
    cached_auth_header: Option<String>,
    cached_completions_url: String,
    settings: ProviderSettings,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: Option<&str>, settings: ProviderSettings) -> Self {
        Self::with_base_url("openai", api_key, DEFAULT_BASE_URL, settings)
    }

    /// `base_url` is the API root, e.g. `http://localhost:11434/v1`.
    pub fn with_base_url(
        name: &str,
        api_key: Option<&str>,
        base_url: &str,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            name: name.to_string(),
            cached_auth_header: api_key
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(|k| format!("Bearer {k}")),
            cached_completions_url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            client: build_provider_client_with_timeout(settings.timeout_secs),
            settings,
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        &self.name
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
            // Custom endpoints (local servers) may run without a key.
            if self.cached_auth_header.is_none() && self.name == "openai" {
                return Err(LlmError::Auth {
                    provider: self.name.clone(),
                }
                .into());
            }

            let mut request = self.client.post(&self.cached_completions_url);
            if let Some(auth) = &self.cached_auth_header {
                request = request.header("Authorization", auth);
            }
            let body = build_request(&self.settings, system, messages, max_tokens);
            send(&self.name, request, &body).await
        })
    }
}
