//! Server settings loaded from the environment.
//!
//! One credential (`AI_GATEWAY_API_KEY`) authenticates both the model gateway
//! and the v0 UI-generation API. Everything else has a default.

use std::str::FromStr;
use std::time::Duration;

/// Configuration loading errors.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://ai-gateway.vercel.sh/v1";
pub const DEFAULT_CHAT_MODEL: &str = "openai/gpt-4o";
pub const DEFAULT_V0_API_BASE: &str = "https://api.v0.dev/v1";
pub const DEFAULT_V0_MODEL_ID: &str = "v0-1.5-sm";
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_DURATION_SECS: u64 = 30;
pub const DEFAULT_MAX_STEPS: usize = 5;
pub const DEFAULT_WEATHER_LATENCY_MS: u64 = 1500;
pub const DEFAULT_V0_TIMEOUT_SECS: u64 = 20;

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Credential for the model gateway and the v0 API.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible model gateway.
    pub gateway_base_url: String,
    /// Model identifier passed to the gateway.
    pub chat_model: String,
    pub v0_api_base: String,
    pub v0_model_id: String,
    /// Request timeout of the v0 client. Always shorter than `max_duration`
    /// so a slow generation fails as a tool error instead of hitting the deadline.
    pub v0_timeout: Duration,
    pub bind_addr: String,
    /// Ceiling on a single streamed response.
    pub max_duration: Duration,
    /// Maximum number of model calls per request.
    pub max_steps: usize,
    /// Simulated latency of the weather tool.
    pub weather_latency: Duration,
}

impl Settings {
    /// Loads settings from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = get("AI_GATEWAY_API_KEY").ok_or(ConfigError::Missing("AI_GATEWAY_API_KEY"))?;
        let max_duration_secs =
            parse_or("MAX_DURATION_SECS", get("MAX_DURATION_SECS"), DEFAULT_MAX_DURATION_SECS)?;
        let v0_timeout_secs = match get("V0_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = parse_or("V0_TIMEOUT_SECS", Some(raw.clone()), 0)?;
                if secs == 0 || secs >= max_duration_secs {
                    return Err(ConfigError::Invalid { key: "V0_TIMEOUT_SECS", value: raw });
                }
                secs
            }
            None => DEFAULT_V0_TIMEOUT_SECS.min(max_duration_secs.saturating_sub(1)).max(1),
        };

        Ok(Self {
            api_key,
            gateway_base_url: get("AI_GATEWAY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.into()),
            chat_model: get("CHAT_MODEL").unwrap_or_else(|| DEFAULT_CHAT_MODEL.into()),
            v0_api_base: get("V0_API_BASE").unwrap_or_else(|| DEFAULT_V0_API_BASE.into()),
            v0_model_id: get("V0_MODEL_ID").unwrap_or_else(|| DEFAULT_V0_MODEL_ID.into()),
            v0_timeout: Duration::from_secs(v0_timeout_secs),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into()),
            max_duration: Duration::from_secs(max_duration_secs),
            max_steps: parse_or("MAX_STEPS", get("MAX_STEPS"), DEFAULT_MAX_STEPS)?,
            weather_latency: Duration::from_millis(parse_or(
                "WEATHER_LATENCY_MS",
                get("WEATHER_LATENCY_MS"),
                DEFAULT_WEATHER_LATENCY_MS,
            )?),
        })
    }
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    match raw {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}
