use std::fs;

use anyhow::Context;
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub server_bind: String,
    /// Envelopes buffered per voice session before a tool call waits.
    pub event_capacity: usize,
    pub google_api_key: Option<String>,
    pub temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "0.0.0.0:8000".into(),
            event_capacity: 64,
            google_api_key: None,
            temperature: 0.6,
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(SETTINGS_FILE) {
        if let Err(error) = apply_file(&mut settings, &raw) {
            warn!(%error, file = SETTINGS_FILE, "ignoring unreadable settings file");
        }
    }
    apply_env(&mut settings, |key| std::env::var(key).ok());

    settings
}

fn apply_file(settings: &mut Settings, raw: &str) -> anyhow::Result<()> {
    let file_cfg: toml::Table =
        toml::from_str(raw).with_context(|| format!("{SETTINGS_FILE} is not valid TOML"))?;

    if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
        settings.server_bind = v.to_string();
    }
    if let Some(v) = file_cfg.get("event_capacity").and_then(toml::Value::as_integer) {
        settings.event_capacity = usize::try_from(v)
            .with_context(|| format!("event_capacity must not be negative, got {v}"))?;
    }
    if let Some(v) = file_cfg.get("temperature") {
        let parsed = v
            .as_float()
            .or_else(|| v.as_integer().map(|i| i as f64))
            .with_context(|| format!("temperature must be a number, got {v}"))?;
        settings.temperature = parsed as f32;
    }

    Ok(())
}

fn apply_env(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = var("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = var("APP__EVENT_CAPACITY") {
        match v.parse::<usize>() {
            Ok(parsed) => settings.event_capacity = parsed,
            Err(_) => warn!(
                value = %v,
                keeping = settings.event_capacity,
                "APP__EVENT_CAPACITY is not a number"
            ),
        }
    }

    if let Some(v) = var("APP__TEMPERATURE") {
        if let Ok(parsed) = v.parse::<f32>() {
            settings.temperature = parsed;
        }
    }

    if let Some(v) = var("GOOGLE_API_KEY").filter(|v| !v.trim().is_empty()) {
        settings.google_api_key = Some(v);
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
