//! GitHub OAuth device flow used to obtain the token the Copilot backend
//! exchanges for chat credentials.

use super::http_client::build_provider_client_with_timeout;
use super::scrub::api_error;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};

pub const GITHUB_BASE_URL: &str = "https://github.com";
/// Public client id of the editor integration.
pub const CLIENT_ID: &str = "Iv1.b507a08c87ecfe98";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const SLOW_DOWN_STEP_SECS: u64 = 5;

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_interval() -> u64 {
    5
}

fn default_expires_in() -> u64 {
    900
}

#[derive(Debug, Deserialize)]
struct PollResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Token(String),
    Pending,
    SlowDown,
    Failed(String),
}

pub struct DeviceFlow {
    client: Client,
    base_url: String,
}

impl Default for DeviceFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceFlow {
    pub fn new() -> Self {
        Self::with_base_url(GITHUB_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: build_provider_client_with_timeout(30),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn request_code(&self) -> Result<DeviceCode> {
        let response = self
            .client
            .post(format!("{}/login/device/code", self.base_url))
            .header("Accept", "application/json")
            .json(&serde_json::json!({ "client_id": CLIENT_ID, "scope": "read:user" }))
            .send()
            .await
            .context("request device code")?;

        if !response.status().is_success() {
            return Err(api_error("GitHub device flow", response).await);
        }
        response.json().await.context("decode device code response")
    }

    pub async fn poll_once(&self, device_code: &str) -> Result<PollOutcome> {
        let response = self
            .client
            .post(format!("{}/login/oauth/access_token", self.base_url))
            .header("Accept", "application/json")
            .json(&serde_json::json!({
                "client_id": CLIENT_ID,
                "device_code": device_code,
                "grant_type": GRANT_TYPE,
            }))
            .send()
            .await
            .context("poll device flow")?;

        let body: PollResponse = response.json().await.context("decode poll response")?;
        if let Some(token) = body.access_token.filter(|t| !t.is_empty()) {
            return Ok(PollOutcome::Token(token));
        }
        Ok(match body.error.as_deref() {
            Some("authorization_pending") => PollOutcome::Pending,
            Some("slow_down") => PollOutcome::SlowDown,
            Some(other) => PollOutcome::Failed(
                body.error_description
                    .unwrap_or_else(|| other.to_string()),
            ),
            None => PollOutcome::Failed("no token in response".into()),
        })
    }

    /// Poll until the user approves, the code expires, or GitHub refuses.
    pub async fn wait_for_token(&self, code: &DeviceCode) -> Result<String> {
        let deadline = Instant::now() + Duration::from_secs(code.expires_in);
        let mut interval = code.interval;

        loop {
            tokio::time::sleep(Duration::from_secs(interval)).await;
            anyhow::ensure!(Instant::now() < deadline, "device code expired before approval");

            match self.poll_once(&code.device_code).await? {
                PollOutcome::Token(token) => return Ok(token),
                PollOutcome::Pending => {}
                PollOutcome::SlowDown => {
                    interval += SLOW_DOWN_STEP_SECS;
                    tracing::debug!(interval, "device flow asked to slow down");
                }
                PollOutcome::Failed(reason) => anyhow::bail!("device flow failed: {reason}"),
            }
        }
    }
}
