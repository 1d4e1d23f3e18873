use std::fs;

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    /// Capacity of the broadcast channel feeding WebSocket subscribers.
    pub event_buffer: usize,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            event_buffer: 256,
            max_body_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    event_buffer: Option<usize>,
    max_body_bytes: Option<usize>,
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let file = match fs::read_to_string(DEFAULT_CONFIG_PATH) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {DEFAULT_CONFIG_PATH}"));
        }
    };
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

/// Layers defaults, then the TOML file, then environment variables.
pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg: FileSettings =
            toml::from_str(raw).context("failed to parse server configuration file")?;
        if let Some(v) = file_cfg.bind_addr {
            settings.server_bind = v;
        }
        if let Some(v) = file_cfg.event_buffer {
            settings.event_buffer = v;
        }
        if let Some(v) = file_cfg.max_body_bytes {
            settings.max_body_bytes = v;
        }
    }

    if let Some(v) = env("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = env("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = env("APP__EVENT_BUFFER") {
        settings.event_buffer = v
            .parse()
            .with_context(|| format!("APP__EVENT_BUFFER must be a positive integer, got '{v}'"))?;
    }
    if let Some(v) = env("APP__MAX_BODY_BYTES") {
        settings.max_body_bytes = v.parse().with_context(|| {
            format!("APP__MAX_BODY_BYTES must be a positive integer, got '{v}'")
        })?;
    }

    if settings.event_buffer == 0 {
        anyhow::bail!("event buffer must be at least 1");
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
