use std::{str::FromStr, time::Duration};

use url::Url;

use crate::{error::ConfigError, form::UnknownFieldPolicy};

pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/voice";
pub const ENDPOINT_ENV: &str = "VOICE_AGENT_URL";
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Upper bound on a pending `connect`; elapsing it lands in `Error`.
    pub connect_timeout: Duration,
    pub unknown_field_policy: UnknownFieldPolicy,
    pub event_capacity: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            unknown_field_policy: UnknownFieldPolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// Picks the endpoint: explicit value, then `VOICE_AGENT_URL`, then the
/// local development default.
pub fn resolve_endpoint(explicit: Option<&str>) -> String {
    resolve_endpoint_with(explicit, std::env::var(ENDPOINT_ENV).ok())
}

fn resolve_endpoint_with(explicit: Option<&str>, from_env: Option<String>) -> String {
    explicit
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| from_env.filter(|v| !v.trim().is_empty()))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

pub fn normalize_endpoint(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ConfigError::EmptyEndpoint);
    }

    let mut url = Url::parse(raw).map_err(|source| ConfigError::InvalidEndpoint {
        endpoint: raw.to_string(),
        source,
    })?;
    let target = match url.scheme() {
        "ws" | "wss" => return Ok(url),
        "http" => "ws",
        "https" => "wss",
        other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
    };
    url.set_scheme(target)
        .map_err(|()| ConfigError::UnsupportedScheme(url.scheme().to_string()))?;
    Ok(url)
}

impl FromStr for UnknownFieldPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "ignore" => Ok(Self::Ignore),
            "reject" => Ok(Self::Reject),
            other => Err(ConfigError::UnknownPolicy(other.to_string())),
        }
    }
}
