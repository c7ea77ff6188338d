//! Typed application settings loaded from config files and environment.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// System prompt used when `SYSTEM_MESSAGE` is not configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert reviewer of business requirements and source code. \
     Find logical errors, ambiguous wording and contradictions in requirements, \
     check code against the stated requirements and report quality issues. \
     Answer in the language of the request.";

fn default_scope() -> String {
    "GIGACHAT_API_PERS".to_string()
}

fn default_auth_url() -> String {
    "https://ngw.devices.sberbank.ru:9443/api/v2/oauth".to_string()
}

fn default_base_url() -> String {
    "https://gigachat.devices.sberbank.ru/api/v1".to_string()
}

fn default_model() -> String {
    "GigaChat-2-Max".to_string()
}

fn default_timeout_secs() -> u64 {
    360
}

fn default_temperature() -> f32 {
    0.18
}

fn default_top_p() -> f32 {
    0.3
}

/// Application settings.
///
/// Values come from `config/{default,local}` files and from environment
/// variables (uppercase, e.g. `TELEGRAM_TOKEN`, `GIGACHAT_CREDENTIALS`).
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram bot API token.
    pub telegram_token: String,

    /// Comma-separated list of allowed Telegram user ids. Empty or unset
    /// means the bot answers everyone.
    #[serde(rename = "allowed_users")]
    pub allowed_users_str: Option<String>,

    /// Base64 authorization key for the GigaChat OAuth exchange.
    pub gigachat_credentials: String,

    /// OAuth scope, personal by default.
    #[serde(default = "default_scope")]
    pub gigachat_scope: String,

    /// OAuth token endpoint.
    #[serde(default = "default_auth_url")]
    pub gigachat_auth_url: String,

    /// Chat API base URL.
    #[serde(default = "default_base_url")]
    pub gigachat_base_url: String,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_model")]
    pub gigachat_model: String,

    /// Whether to verify TLS certificates of the GigaChat endpoints.
    /// Off by default: the API is served with a national CA certificate.
    #[serde(default)]
    pub verify_ssl_certs: bool,

    /// Per-request timeout, generous because analysis answers are long.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Sampling temperature for completions.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling cut-off for completions.
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// System prompt override.
    pub system_message: Option<String>,
}

impl Settings {
    /// Load settings from layered sources.
    ///
    /// # Errors
    ///
    /// Returns an error when a required value is missing or a source fails
    /// to parse.
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::default())
            .build()?;

        s.try_deserialize()
    }

    /// Parsed allow-list of Telegram user ids.
    #[must_use]
    pub fn allowed_users(&self) -> HashSet<i64> {
        self.allowed_users_str
            .as_ref()
            .map(|s| {
                s.split(',')
                    .filter_map(|id| id.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Effective system prompt.
    #[must_use]
    pub fn system_prompt(&self) -> String {
        self.system_message
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string())
    }
}
