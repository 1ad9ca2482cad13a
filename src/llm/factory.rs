use super::anthropic::AnthropicProvider;
use super::copilot::CopilotProvider;
use super::openai::{self, OpenAiProvider};
use super::traits::Provider;
use super::types::ProviderSettings;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;

/// Resolve a credential from config, then environment variables.
///
/// Resolution order:
/// 1. Explicit value (trimmed, ignored when empty)
/// 2. Provider-specific variables (e.g. `ANTHROPIC_API_KEY`, `GITHUB_TOKEN`)
/// 3. The generic `MEDIA_LEVERAGE_API_KEY`
pub fn resolve_api_key(name: &str, explicit: Option<&str>) -> Option<String> {
    if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        return Some(key.to_string());
    }

    let candidates: &[&str] = match name {
        "anthropic" => &["ANTHROPIC_OAUTH_TOKEN", "ANTHROPIC_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "copilot" => &["GITHUB_TOKEN", "GH_TOKEN"],
        "custom" => &["OPENAI_API_KEY"],
        _ => &[],
    };

    candidates
        .iter()
        .chain(["MEDIA_LEVERAGE_API_KEY"].iter())
        .find_map(|var| {
            std::env::var(var)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        })
}

pub fn create_provider(config: &LlmConfig) -> anyhow::Result<Arc<dyn Provider>> {
    let settings = ProviderSettings {
        model: config.effective_model(),
        temperature: config.temperature,
        timeout_secs: config.request_timeout_secs,
    };
    let name = config.provider.trim().to_ascii_lowercase();

    let provider: Arc<dyn Provider> = match name.as_str() {
        "anthropic" => {
            let key = resolve_api_key("anthropic", config.api_key.as_deref());
            Arc::new(AnthropicProvider::with_base_url(
                key.as_deref(),
                config.base_url.as_deref(),
                settings,
            ))
        }
        "openai" => {
            let key = resolve_api_key("openai", config.api_key.as_deref());
            let base = config.base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL);
            Arc::new(OpenAiProvider::with_base_url(
                "openai",
                key.as_deref(),
                base,
                settings,
            ))
        }
        "custom" => {
            let base = config
                .base_url
                .as_deref()
                .filter(|u| !u.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("custom provider requires llm.base_url"))?;
            let key = resolve_api_key("custom", config.api_key.as_deref());
            Arc::new(OpenAiProvider::with_base_url(
                "custom",
                key.as_deref(),
                base,
                settings,
            ))
        }
        "copilot" => {
            let token = resolve_api_key("copilot", config.github_token.as_deref());
            Arc::new(CopilotProvider::new(token.as_deref(), settings))
        }
        other => return Err(LlmError::UnknownProvider(other.to_string()).into()),
    };

    tracing::debug!(provider = provider.name(), model = provider.model(), "provider created");
    Ok(provider)
}
