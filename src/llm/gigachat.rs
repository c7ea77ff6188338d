//! Thin reqwest wrapper over the GigaChat chat-completion API.
//!
//! Two round trips: an OAuth token exchange (cached until shortly before
//! expiry) and the completion call itself. The conversation thread id is
//! forwarded as the `X-Session-ID` header.

use super::{ChatCompletion, ChatMessage, LlmError};
use crate::config::Settings;
use reqwest::Client as HttpClient;
use serde_json::json;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// Refresh the token this many milliseconds before the reported expiry.
const TOKEN_EXPIRY_SLACK_MS: i64 = 60_000;

struct CachedToken {
    access_token: String,
    expires_at_ms: i64,
}

/// GigaChat API client.
pub struct GigaChatClient {
    http: HttpClient,
    credentials: String,
    scope: String,
    auth_url: String,
    base_url: String,
    model: String,
    temperature: f32,
    top_p: f32,
    token: Mutex<Option<CachedToken>>,
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}

impl GigaChatClient {
    /// Build a client from settings.
    ///
    /// # Errors
    ///
    /// Returns an error when the underlying HTTP client cannot be
    /// constructed.
    pub fn new(settings: &Settings) -> Result<Self, LlmError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .danger_accept_invalid_certs(!settings.verify_ssl_certs)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            http,
            credentials: settings.gigachat_credentials.clone(),
            scope: settings.gigachat_scope.clone(),
            auth_url: settings.gigachat_auth_url.clone(),
            base_url: settings.gigachat_base_url.clone(),
            model: settings.gigachat_model.clone(),
            temperature: settings.temperature,
            top_p: settings.top_p,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, LlmError> {
        let mut cache = self.token.lock().await;

        if let Some(token) = cache.as_ref() {
            if token.expires_at_ms - TOKEN_EXPIRY_SLACK_MS > now_ms() {
                return Ok(token.access_token.clone());
            }
            debug!("GigaChat access token expired, refreshing");
        }

        let response = self
            .http
            .post(&self.auth_url)
            .header("Authorization", format!("Basic {}", self.credentials))
            .header("RqUID", Uuid::new_v4().to_string())
            .header("Accept", "application/json")
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Auth(format!(
                "token exchange failed: {status} - {body}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Json(e.to_string()))?;

        let access_token = payload["access_token"]
            .as_str()
            .ok_or_else(|| LlmError::Auth("token response without access_token".to_string()))?
            .to_string();
        let expires_at_ms = payload["expires_at"].as_i64().unwrap_or(0);

        info!("Obtained GigaChat access token");
        *cache = Some(CachedToken {
            access_token: access_token.clone(),
            expires_at_ms,
        });

        Ok(access_token)
    }
}

#[async_trait::async_trait]
impl ChatCompletion for GigaChatClient {
    async fn complete(
        &self,
        thread_id: &str,
        history: &[ChatMessage],
        user_text: &str,
    ) -> Result<String, LlmError> {
        let token = self.access_token().await?;

        let mut messages: Vec<serde_json::Value> = history
            .iter()
            .map(|m| serde_json::to_value(m).unwrap_or_default())
            .collect();
        messages.push(json!({"role": "user", "content": user_text}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "top_p": self.top_p,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .header("X-Session-ID", thread_id)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status == reqwest::StatusCode::UNAUTHORIZED {
                // Force a token refresh on the next call.
                *self.token.lock().await = None;
            }
            return Err(LlmError::Api(format!(
                "GigaChat API error: {status} - {body}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LlmError::Json(e.to_string()))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| LlmError::Api("Empty response".to_string()))
    }
}
