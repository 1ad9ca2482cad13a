use super::chat_completions::{build_request, send};
use super::http_client::build_provider_client_with_timeout;
use super::scrub::api_error;
use super::traits::Provider;
use super::types::{ProviderMessage, ProviderResponse, ProviderSettings};
use crate::error::LlmError;
use anyhow::Context;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use tokio::sync::Mutex;

pub const TOKEN_URL: &str = "https://api.github.com/copilot_internal/v2/token";
pub const DEFAULT_API_BASE: &str = "https://api.individual.githubcopilot.com";

/// Refresh this many seconds before the advertised expiry.
const REFRESH_BEFORE_SECS: i64 = 60;
/// Assumed lifetime when the exchange response omits `expires_at`.
const FALLBACK_TTL_SECS: i64 = 25 * 60;

const EDITOR_VERSION: &str = "vscode/1.95.0";
const EDITOR_PLUGIN_VERSION: &str = "copilot-chat/0.22.4";
const INTEGRATION_ID: &str = "vscode-chat";
const USER_AGENT: &str = "GithubCopilot/1.246.0";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: String,
    expires_at: Option<i64>,
    endpoints: Option<Endpoints>,
}

#[derive(Debug, Deserialize)]
struct Endpoints {
    api: Option<String>,
}

#[derive(Debug, Clone)]
struct CopilotSession {
    token: String,
    api_base: String,
    expires_at: i64,
}

impl CopilotSession {
    fn is_fresh(&self, now: i64) -> bool {
        now < self.expires_at - REFRESH_BEFORE_SECS
    }
}

/// GitHub Copilot chat backend.
///
/// A long-lived GitHub token is exchanged for a short-lived Copilot token,
/// which is cached and refreshed shortly before it expires.
pub struct CopilotProvider {
    github_token: Option<String>,
    token_url: String,
    settings: ProviderSettings,
    client: Client,
    session: Mutex<Option<CopilotSession>>,
}

impl CopilotProvider {
    pub fn new(github_token: Option<&str>, settings: ProviderSettings) -> Self {
        Self::with_token_url(github_token, TOKEN_URL, settings)
    }

    pub fn with_token_url(
        github_token: Option<&str>,
        token_url: &str,
        settings: ProviderSettings,
    ) -> Self {
        Self {
            github_token: github_token
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(ToString::to_string),
            token_url: token_url.to_string(),
            client: build_provider_client_with_timeout(settings.timeout_secs),
            settings,
            session: Mutex::new(None),
        }
    }

    async fn current_session(&self) -> anyhow::Result<CopilotSession> {
        let mut cached = self.session.lock().await;
        let now = chrono::Utc::now().timestamp();
        if let Some(session) = cached.as_ref()
            && session.is_fresh(now)
        {
            return Ok(session.clone());
        }

        let fresh = self.exchange(now).await?;
        tracing::debug!(
            api_base = %fresh.api_base,
            expires_in = fresh.expires_at - now,
            "copilot token refreshed"
        );
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    async fn exchange(&self, now: i64) -> anyhow::Result<CopilotSession> {
        let github_token = self.github_token.as_deref().ok_or_else(|| LlmError::Auth {
            provider: "copilot".into(),
        })?;

        let response = self
            .client
            .get(&self.token_url)
            .header("Authorization", format!("token {github_token}"))
            .header("Accept", "application/json")
            .header("Editor-Version", EDITOR_VERSION)
            .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION)
            .header("Copilot-Integration-Id", INTEGRATION_ID)
            .header("User-Agent", USER_AGENT)
            .header("X-GitHub-Api-Version", "2023-01-01")
            .send()
            .await
            .context("copilot token exchange request")?;

        if !response.status().is_success() {
            return Err(api_error("Copilot token exchange", response).await);
        }

        let body: TokenResponse = response
            .json()
            .await
            .context("decode copilot token response")?;

        let api_base = body
            .endpoints
            .and_then(|e| e.api)
            .filter(|api| !api.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Ok(CopilotSession {
            token: body.token,
            api_base: api_base.trim_end_matches('/').to_string(),
            expires_at: body.expires_at.unwrap_or(now + FALLBACK_TTL_SECS),
        })
    }
}

impl Provider for CopilotProvider {
    fn name(&self) -> &str {
        "copilot"
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
            let session = self.current_session().await?;
            let request = self
                .client
                .post(format!("{}/chat/completions", session.api_base))
                .header("Authorization", format!("Bearer {}", session.token))
                .header("Copilot-Integration-Id", INTEGRATION_ID)
                .header("Editor-Version", EDITOR_VERSION)
                .header("Editor-Plugin-Version", EDITOR_PLUGIN_VERSION);
            let body = build_request(&self.settings, system, messages, max_tokens);
            send("copilot", request, &body).await
        })
    }

    fn warmup(&self) -> Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + '_>> {
        Box::pin(async move {
            self.current_session().await?;
            Ok(())
        })
    }
}
