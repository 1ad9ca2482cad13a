use crate::config::{Config, RatePolicyConfig};

fn rate_policy(policy: RatePolicyConfig) -> String {
    t!(
        "status.rate_policy",
        max = policy.max_events,
        window = policy.window_secs
    )
    .to_string()
}

/// One-screen summary of the effective configuration. Secrets are never
/// printed.
pub fn render_status(config: &Config) -> String {
    let delivery = match config.telegram.webhook_url() {
        Some(url) => t!("status.webhook", url = url).to_string(),
        None => t!("status.polling").to_string(),
    };

    [
        format!("◆ {}", t!("status.title")),
        String::new(),
        format!("  {}     {}", t!("status.version"), env!("CARGO_PKG_VERSION")),
        format!("  {}      {}", t!("status.config"), config.config_path.display()),
        String::new(),
        format!("  {}    {}", t!("status.provider"), config.llm.provider),
        format!("  {}       {}", t!("status.model"), config.llm.effective_model()),
        format!("  {}    {}", t!("status.delivery"), delivery),
        format!(
            "  {}    {}",
            t!("status.database"),
            config.storage.db_path().display()
        ),
        format!(
            "  {}  {}",
            t!("status.users"),
            config.storage.users_path().display()
        ),
        format!(
            "  {} {}",
            t!("status.rate_pipeline"),
            rate_policy(config.rate_limit.pipeline)
        ),
        format!(
            "  {}     {}",
            t!("status.rate_chat"),
            rate_policy(config.rate_limit.chat_turn)
        ),
        format!(
            "  {}   {}",
            t!("status.log_level"),
            config.observability.level()
        ),
    ]
    .join("\n")
}
