use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

use crate::state::DEFAULT_KEYRING_SERVICE;

pub const KEY_API_BASE_URL: &str = "AURORATRIP_API_BASE_URL";
pub const KEY_REQUEST_TIMEOUT_SECONDS: &str = "AURORATRIP_REQUEST_TIMEOUT_SECONDS";
pub const KEY_CONNECT_TIMEOUT_SECONDS: &str = "AURORATRIP_CONNECT_TIMEOUT_SECONDS";
pub const KEY_REFRESH_TIMEOUT_SECONDS: &str = "AURORATRIP_REFRESH_TIMEOUT_SECONDS";
pub const KEY_KEYRING_SERVICE: &str = "AURORATRIP_KEYRING_SERVICE";

const DEFAULT_API_BASE_URL: &str = "http://localhost:2500";
const DEFAULT_REQUEST_TIMEOUT_SECONDS: u64 = 40;
const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_REFRESH_TIMEOUT_SECONDS: u64 = 15;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid API base URL {value:?}: {reason}")]
    InvalidBaseUrl { value: String, reason: String },
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Upper bound on one refresh call; queued requests wait at most this long.
    pub refresh_timeout: Duration,
    pub keyring_service: String,
}

struct Lookup<F> {
    get: F,
}

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn get_string(&self, key: &str) -> Option<String> {
        let v = (self.get)(key)?;
        let s = v.trim();
        if s.is_empty() {
            None
        } else {
            Some(s.to_string())
        }
    }

    fn get_u64(&self, key: &str, fallback: u64) -> u64 {
        match self.get_string(key).map(|s| s.parse::<u64>()) {
            Some(Ok(v)) if v > 0 => v,
            Some(_) => {
                tracing::warn!(key, fallback, "ignoring invalid setting");
                fallback
            }
            None => fallback,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = Lookup { get };

        let api_base_url = match lookup.get_string(KEY_API_BASE_URL) {
            Some(raw) => parse_base_url(&raw)?,
            None => parse_base_url(DEFAULT_API_BASE_URL)?,
        };

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(
                lookup.get_u64(KEY_REQUEST_TIMEOUT_SECONDS, DEFAULT_REQUEST_TIMEOUT_SECONDS),
            ),
            connect_timeout: Duration::from_secs(
                lookup.get_u64(KEY_CONNECT_TIMEOUT_SECONDS, DEFAULT_CONNECT_TIMEOUT_SECONDS),
            ),
            refresh_timeout: Duration::from_secs(
                lookup.get_u64(KEY_REFRESH_TIMEOUT_SECONDS, DEFAULT_REFRESH_TIMEOUT_SECONDS),
            ),
            keyring_service: lookup
                .get_string(KEY_KEYRING_SERVICE)
                .unwrap_or_else(|| DEFAULT_KEYRING_SERVICE.to_string()),
        })
    }

    /// Defaults everywhere except the base URL.
    pub fn for_base_url(raw: &str) -> Result<Self, SettingsError> {
        let mut settings = Self::from_lookup(|_| None)?;
        settings.api_base_url = parse_base_url(raw)?;
        Ok(settings)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, SettingsError> {
    let invalid = |reason: String| SettingsError::InvalidBaseUrl {
        value: raw.to_string(),
        reason,
    };
    let url = Url::parse(raw.trim()).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(invalid(format!("unsupported scheme {other}"))),
    }
    if url.cannot_be_a_base() {
        return Err(invalid("not a base URL".to_string()));
    }
    Ok(url)
}
