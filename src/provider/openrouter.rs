use std::sync::Arc;

use futures_util::TryStreamExt;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{CompletionOptions, CompletionSource, UpstreamBody};
use crate::chat::ChatMessage;
use crate::config::ProviderConfig;
use crate::error::ChatError;
use crate::transport::HttpTransport;

const API_KEY_ENV: &str = "OPENROUTER_API_KEY";
const HTTP_REFERER: HeaderName = HeaderName::from_static("http-referer");
const X_TITLE: HeaderName = HeaderName::from_static("x-title");
const MAX_ERROR_MESSAGE_LEN: usize = 500;
const PRIVACY_SETTINGS_URL: &str = "https://openrouter.ai/settings/privacy";

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for an OpenRouter-compatible chat-completions endpoint.
pub struct ProviderClient {
    config: ProviderConfig,
    transport: Arc<HttpTransport>,
    endpoint: String,
}

impl ProviderClient {
    #[must_use]
    pub fn new(config: ProviderConfig, transport: Arc<HttpTransport>) -> Self {
        let endpoint = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));
        Self {
            config,
            transport,
            endpoint,
        }
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.config.model
    }

    #[must_use]
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.trim().is_empty()
    }

    fn api_key(&self) -> Result<&str, ChatError> {
        let key = self.config.api_key.trim();
        if key.is_empty() {
            return Err(ChatError::Config(format!(
                "Model provider API key is not configured. Please set the {API_KEY_ENV} environment variable."
            )));
        }
        Ok(key)
    }

    fn headers(&self) -> Result<http::HeaderMap, ChatError> {
        let key = self.api_key()?;
        let mut headers = http::HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| {
            ChatError::Config(format!("{API_KEY_ENV} contains characters not allowed in a header"))
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let optional = [
            (HTTP_REFERER, self.config.referer_url.as_deref()),
            (X_TITLE, self.config.app_name.as_deref()),
        ];
        for (name, value) in optional {
            let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
                continue;
            };
            match HeaderValue::from_str(value) {
                Ok(value) => {
                    headers.insert(name, value);
                }
                Err(_) => tracing::warn!(header = %name, "skipping attribution header with invalid value"),
            }
        }
        Ok(headers)
    }

    async fn send(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
        stream: bool,
    ) -> Result<reqwest::Response, ChatError> {
        let headers = self.headers()?;
        let body = serde_json::to_vec(&CompletionRequest {
            model: &self.config.model,
            messages,
            stream,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
        })
        .map_err(|err| ChatError::Internal(format!("Failed to encode completion request: {err}")))?;

        let response = self.transport.post_json(&self.endpoint, headers, body).await?;
        let status = response.status();
        if !status.is_success() {
            let err = rejection(response).await;
            tracing::warn!(status = status.as_u16(), error = %err, "provider rejected completion request");
            return Err(err);
        }
        Ok(response)
    }

    /// Non-streaming completion; returns `choices[0].message.content`.
    ///
    /// # Errors
    ///
    /// Same as [`CompletionSource::open_stream`], plus `ChatError::Upstream`
    /// when the response body cannot be decoded.
    pub async fn complete(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<String, ChatError> {
        let response = self.send(messages, options, false).await?;
        let status = response.status().as_u16();
        let parsed: CompletionResponse = response.json().await.map_err(|err| ChatError::Upstream {
            status,
            message: format!("Invalid completion response: {err}"),
        })?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}

impl CompletionSource for ProviderClient {
    async fn open_stream(
        &self,
        messages: &[ChatMessage],
        options: CompletionOptions,
    ) -> Result<UpstreamBody, ChatError> {
        let response = self.send(messages, options, true).await?;
        let body = response
            .bytes_stream()
            .map_err(|err| ChatError::Transport(format!("Upstream stream interrupted: {err}")));
        Ok(Box::pin(body))
    }
}

fn truncate_message(message: &str) -> String {
    match message.char_indices().nth(MAX_ERROR_MESSAGE_LEN) {
        Some((cut, _)) => format!("{}...", &message[..cut]),
        None => message.to_string(),
    }
}

fn extract_error_message(status: u16, body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        if let Some(msg) = json
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            return truncate_message(msg);
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("Provider API error: {status}")
    } else {
        truncate_message(text)
    }
}

/// Read the body of a rejected request and map it. An unreadable body still
/// yields an error for the status.
async fn rejection(response: reqwest::Response) -> ChatError {
    let status = response.status().as_u16();
    let body = match response.bytes().await {
        Ok(body) => body,
        Err(err) => {
            tracing::debug!(status, error = %err, "failed to read provider error body");
            bytes::Bytes::new()
        }
    };
    upstream_error(status, &body)
}

/// Map a non-2xx provider response to `ChatError::Upstream`, adding guidance
/// for authentication and data-policy failures.
#[must_use]
pub fn upstream_error(status: u16, body: &[u8]) -> ChatError {
    let detail = extract_error_message(status, body);
    let message = if status == 401 {
        format!(
            "Provider authentication failed: {detail}. Please check that your {API_KEY_ENV} is correct."
        )
    } else if detail.contains("data policy")
        || detail.contains("privacy")
        || detail.contains("No endpoints found")
    {
        format!(
            "Provider data policy configuration required: {detail}\nPlease configure your privacy settings at {PRIVACY_SETTINGS_URL}"
        )
    } else {
        detail
    };
    ChatError::Upstream { status, message }
}
