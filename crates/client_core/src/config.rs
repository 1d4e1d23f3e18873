use std::time::Duration;

use anyhow::Context;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:8080";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SUGGESTION_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    pub poll_interval: Duration,
    pub suggestion_timeout: Duration,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            suggestion_timeout: DEFAULT_SUGGESTION_TIMEOUT,
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
        }
    }
}

impl ClientSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    pub fn from_env_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let mut settings = Self::default();

        if let Some(url) = env("APP__SERVER_URL") {
            settings.server_url = url;
        }
        settings.gemini_api_key = env("GEMINI_API_KEY")
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        if let Some(model) = env("GEMINI_MODEL").filter(|model| !model.trim().is_empty()) {
            settings.gemini_model = model.trim().to_string();
        }
        if let Some(raw) = env("APP__SUGGESTION_TIMEOUT_SECONDS") {
            let secs: u64 = raw.parse().with_context(|| {
                format!("APP__SUGGESTION_TIMEOUT_SECONDS must be whole seconds, got '{raw}'")
            })?;
            settings.suggestion_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(raw) = env("APP__POLL_INTERVAL_MS") {
            let millis: u64 = raw.parse().with_context(|| {
                format!("APP__POLL_INTERVAL_MS must be milliseconds, got '{raw}'")
            })?;
            settings.poll_interval = Duration::from_millis(millis.max(50));
        }

        Ok(settings)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
