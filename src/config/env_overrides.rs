use super::Config;

impl Config {
    pub fn apply_env_overrides(&mut self) {
        if let Ok(provider) = std::env::var("MEDIA_LEVERAGE_PROVIDER")
            && !provider.is_empty()
        {
            self.llm.provider = provider;
        }

        if let Ok(model) = std::env::var("MEDIA_LEVERAGE_MODEL")
            && !model.is_empty()
        {
            self.llm.model = Some(model);
        }

        if let Ok(key) = std::env::var("MEDIA_LEVERAGE_API_KEY")
            && !key.is_empty()
        {
            self.llm.api_key = Some(key);
        }

        if let Ok(token) = std::env::var("GITHUB_TOKEN")
            && !token.is_empty()
        {
            self.llm.github_token = Some(token);
        }

        if let Ok(token) = std::env::var("TELEGRAM_BOT_TOKEN")
            && !token.is_empty()
        {
            self.telegram.bot_token = token;
        }

        if let Ok(url) = std::env::var("MEDIA_LEVERAGE_WEBHOOK_URL")
            && !url.is_empty()
        {
            self.telegram.webhook_url = Some(url);
        }

        if let Ok(secret) = std::env::var("MEDIA_LEVERAGE_WEBHOOK_SECRET")
            && !secret.is_empty()
        {
            self.telegram.webhook_secret = Some(secret);
        }

        if let Ok(db_path) = std::env::var("MEDIA_LEVERAGE_DB_PATH")
            && !db_path.is_empty()
        {
            self.storage.db_path = db_path;
        }

        if let Ok(level) = std::env::var("MEDIA_LEVERAGE_LOG_LEVEL")
            && !level.is_empty()
        {
            self.observability.log_level = level;
        }
    }
}
