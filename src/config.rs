//! Configuration loading from the process environment.
//!
//! `.env` is loaded by `main` before [`load`] runs, so values in that file
//! behave exactly like exported variables. Each setting has a primary name
//! and a legacy alias kept for deployments that predate the rename.

use std::env;
use std::fmt;

use reqwest::Url;
use tracing::level_filters::LevelFilter;

use crate::error::AppError;

pub const DEFAULT_PROVIDER_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const DEFAULT_MODEL_NAME: &str = "deepseek-chat";
pub const DEFAULT_LOG_LEVEL: LevelFilter = LevelFilter::INFO;

const BOT_TOKEN: (&str, &str) = ("BOT_TOKEN", "TELEGRAM_BOT_TOKEN");
const PROVIDER_API_KEY: (&str, &str) = ("PROVIDER_API_KEY", "DEEPSEEK_API_KEY");
const PROVIDER_BASE_URL: (&str, &str) = ("PROVIDER_BASE_URL", "DEEPSEEK_BASE_URL");
const MODEL_NAME: (&str, &str) = ("MODEL_NAME", "DEEPSEEK_MODEL");
const LOG_LEVEL: &str = "LOG_LEVEL";
const BOT_API_URL: &str = "BOT_API_URL";

/// Completion provider settings.
#[derive(Clone)]
pub struct ProviderConfig {
    /// Base URL without the `/chat/completions` suffix.
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl ProviderConfig {
    /// Full chat completions endpoint URL.
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

// Keeps the key out of log lines that format the config with `{:?}`.
impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// Fully-resolved, immutable process configuration.
#[derive(Clone)]
pub struct Config {
    pub bot_token: String,
    /// Bot API server override (self-hosted `telegram-bot-api`). `None` uses
    /// the public `api.telegram.org`.
    pub bot_api_url: Option<Url>,
    pub provider: ProviderConfig,
    pub log_level: LevelFilter,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bot_token", &"<redacted>")
            .field("bot_api_url", &self.bot_api_url.as_ref().map(Url::as_str))
            .field("provider", &self.provider)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Load config from the process environment.
pub fn load() -> Result<Config, AppError> {
    load_from(|key| env::var(key).ok())
}

/// Load config using `lookup` to resolve variable names.
///
/// Blank values are treated as unset.
pub fn load_from<F>(lookup: F) -> Result<Config, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |(primary, legacy): (&str, &str)| {
        non_blank(lookup(primary)).or_else(|| non_blank(lookup(legacy)))
    };

    let bot_token = get(BOT_TOKEN).ok_or_else(|| missing(BOT_TOKEN))?;
    let api_key = get(PROVIDER_API_KEY).ok_or_else(|| missing(PROVIDER_API_KEY))?;

    let base_url = get(PROVIDER_BASE_URL).unwrap_or_else(|| DEFAULT_PROVIDER_BASE_URL.to_string());
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(AppError::Config(format!(
            "{} must be an http(s) URL, got '{base_url}'",
            PROVIDER_BASE_URL.0
        )));
    }

    let model = get(MODEL_NAME).unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
    let log_level = match non_blank(lookup(LOG_LEVEL)) {
        Some(raw) => parse_level(&raw)?,
        None => DEFAULT_LOG_LEVEL,
    };

    let bot_api_url = non_blank(lookup(BOT_API_URL))
        .map(|raw| {
            Url::parse(&raw)
                .map_err(|e| AppError::Config(format!("{BOT_API_URL} is not a valid URL '{raw}': {e}")))
        })
        .transpose()?;

    Ok(Config {
        bot_token,
        bot_api_url,
        provider: ProviderConfig { base_url, api_key, model },
        log_level,
    })
}

/// Accepts `off`, `error`, `warn`, `info`, `debug` or `trace` in any case.
fn parse_level(raw: &str) -> Result<LevelFilter, AppError> {
    raw.parse::<LevelFilter>().map_err(|_| {
        AppError::Config(format!(
            "{LOG_LEVEL} must be one of off, error, warn, info, debug, trace; got '{raw}'"
        ))
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn missing((primary, legacy): (&str, &str)) -> AppError {
    AppError::Config(format!("{primary} environment variable is required (or legacy {legacy})"))
}
