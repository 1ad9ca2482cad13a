use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub telegram: TelegramConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            llm: LlmConfig::default(),
            telegram: TelegramConfig::default(),
            rate_limit: RateLimitConfig::default(),
            storage: StorageConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

// ── LLM ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "anthropic" | "openai" | "copilot" | "custom"
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Chat Completions base URL for `openai` and `custom`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// GitHub OAuth token exchanged for Copilot API tokens.
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider() -> String {
    "anthropic".into()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: None,
            base_url: None,
            github_token: None,
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl LlmConfig {
    /// Configured model, or the provider's default.
    pub fn effective_model(&self) -> String {
        if let Some(model) = self.model.as_deref().map(str::trim)
            && !model.is_empty()
        {
            return model.to_string();
        }
        match self.provider.as_str() {
            "anthropic" => "claude-sonnet-4-20250514".into(),
            _ => "gpt-4o".into(),
        }
    }
}

// ── Telegram ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Public HTTPS URL; empty means long polling.
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_webhook_listen")]
    pub webhook_listen: String,
    #[serde(default = "default_webhook_port")]
    pub webhook_port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    /// Interval between "typing" signals while a backend call is pending.
    #[serde(default = "default_activity_interval_secs")]
    pub activity_interval_secs: u64,
}

fn default_webhook_listen() -> String {
    "0.0.0.0".into()
}

fn default_webhook_port() -> u16 {
    8443
}

fn default_max_upload_bytes() -> u64 {
    20 * 1024 * 1024
}

fn default_activity_interval_secs() -> u64 {
    4
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            webhook_url: None,
            webhook_secret: None,
            webhook_listen: default_webhook_listen(),
            webhook_port: default_webhook_port(),
            max_upload_bytes: default_max_upload_bytes(),
            activity_interval_secs: default_activity_interval_secs(),
        }
    }
}

impl TelegramConfig {
    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

// ── Rate limiting ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatePolicyConfig {
    pub window_secs: u64,
    pub max_events: u32,
}

impl RatePolicyConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_pipeline_policy")]
    pub pipeline: RatePolicyConfig,
    #[serde(default = "default_chat_turn_policy")]
    pub chat_turn: RatePolicyConfig,
    /// How often idle buckets are swept from memory.
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
}

fn default_pipeline_policy() -> RatePolicyConfig {
    RatePolicyConfig {
        window_secs: 60,
        max_events: 5,
    }
}

fn default_chat_turn_policy() -> RatePolicyConfig {
    RatePolicyConfig {
        window_secs: 60,
        max_events: 20,
    }
}

fn default_eviction_interval_secs() -> u64 {
    600
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            pipeline: default_pipeline_policy(),
            chat_turn: default_chat_turn_policy(),
            eviction_interval_secs: default_eviction_interval_secs(),
        }
    }
}

// ── Storage ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// JSON allowlist: `{"authorized_users": [{"id": 123}]}`.
    #[serde(default = "default_users_path")]
    pub users_path: String,
}

fn default_db_path() -> String {
    "~/.media-leverage/memory.db".into()
}

fn default_users_path() -> String {
    "~/.media-leverage/users.json".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            users_path: default_users_path(),
        }
    }
}

impl StorageConfig {
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }

    pub fn users_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.users_path).into_owned())
    }
}

// ── Observability ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl ObservabilityConfig {
    pub fn level(&self) -> tracing::Level {
        self.log_level
            .trim()
            .parse::<tracing::Level>()
            .unwrap_or(tracing::Level::INFO)
    }
}

// ── Validation ──────────────────────────────────────────────────────────────

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (kind, policy) in [
            ("pipeline", self.rate_limit.pipeline),
            ("chat_turn", self.rate_limit.chat_turn),
        ] {
            if policy.window_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "rate_limit.{kind}.window_secs must be greater than zero"
                )));
            }
            if policy.max_events == 0 {
                return Err(ConfigError::Validation(format!(
                    "rate_limit.{kind}.max_events must be greater than zero"
                )));
            }
        }

        if !matches!(
            self.llm.provider.as_str(),
            "anthropic" | "openai" | "copilot" | "custom"
        ) {
            return Err(ConfigError::Validation(format!(
                "llm.provider must be one of anthropic, openai, copilot, custom (got {})",
                self.llm.provider
            )));
        }

        if self.llm.provider == "custom" && self.llm.base_url.is_none() {
            return Err(ConfigError::Validation(
                "llm.base_url is required for the custom provider".into(),
            ));
        }

        Ok(())
    }

    /// Stricter checks needed before the bot can start.
    pub fn validate_for_bot(&self) -> Result<(), ConfigError> {
        self.validate()?;
        if self.telegram.bot_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "telegram.bot_token is empty; set it in config.toml or TELEGRAM_BOT_TOKEN".into(),
            ));
        }
        if let Some(url) = self.telegram.webhook_url() {
            url::Url::parse(url).map_err(|e| {
                ConfigError::Validation(format!("telegram.webhook_url is not a valid URL: {e}"))
            })?;
        }
        Ok(())
    }
}
