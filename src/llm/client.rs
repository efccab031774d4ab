//! OpenAI-compatible chat completion client (`{base_url}/chat/completions`).
//!
//! One request per call, no retries, no history. The wire types are private
//! to this module; callers only see [`CompletionResult`].

use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, trace};

use crate::config::ProviderConfig;
use crate::error::AppError;
use crate::llm::{CompletionFailure, CompletionResult, FailureKind};

/// System instruction sent ahead of every user message.
pub const SYSTEM_PROMPT: &str = "You are a helpful and professional AI assistant. \
Provide clear, concise, and accurate responses.";
pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 2000;
/// End-to-end timeout for one completion call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ── Public client ─────────────────────────────────────────────────────────────

/// Owns the HTTP connection pool to the completion provider.
///
/// Built once at startup and shared behind an `Arc` by every event handler.
/// `reqwest::Client` is itself reference-counted, so a call clones the pool
/// handle out of the slot and releases the lock before any I/O.
#[derive(Debug)]
pub struct CompletionClient {
    http: Mutex<Option<Client>>,
    url: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    /// Build the client and its connection pool. No request is sent.
    pub fn new(config: &ProviderConfig) -> Result<Self, AppError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http: Mutex::new(Some(http)),
            url: config.completions_url(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send `user_text` as the user turn and return the generated text.
    ///
    /// Never panics and never returns an error: failures are logged at error
    /// level and returned as [`CompletionResult::Failure`].
    pub async fn complete(&self, user_text: &str) -> CompletionResult {
        match self.request(user_text).await {
            Ok(text) => {
                debug!(reply_len = text.len(), "completion succeeded");
                CompletionResult::Text(text)
            }
            Err(failure) => {
                error!(kind = %failure.kind, detail = %failure.detail, "completion failed");
                CompletionResult::Failure(failure)
            }
        }
    }

    /// Release the connection pool. Returns `false` if it was already released.
    ///
    /// Requests already in flight keep their own pool handle and finish or
    /// time out on their own.
    pub fn close(&self) -> bool {
        let taken = match self.http.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match taken {
            Some(_) => {
                info!("completion client closed");
                true
            }
            None => {
                debug!("completion client already closed");
                false
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.pool().is_none()
    }

    fn pool(&self) -> Option<Client> {
        self.http.lock().ok().and_then(|slot| slot.as_ref().cloned())
    }

    async fn request(&self, user_text: &str) -> Result<String, CompletionFailure> {
        let http = self
            .pool()
            .ok_or_else(|| CompletionFailure::new(FailureKind::UnknownError, "completion client is closed"))?;

        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: [
                Message { role: "system", content: SYSTEM_PROMPT },
                Message { role: "user", content: user_text },
            ],
            stream: false,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        debug!(model = %self.model, content_len = user_text.len(), "sending completion request");
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full completion request payload");
        }

        let response = http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(classify_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read error body>".to_string());
            return Err(CompletionFailure::new(
                FailureKind::HttpError,
                format!("{} {body}", status.as_u16()),
            ));
        }

        let body = response.bytes().await.map_err(|e| {
            CompletionFailure::new(FailureKind::RequestError, format!("failed to read response body: {e}"))
        })?;

        extract_content(&body)
    }
}

fn classify_send_error(e: reqwest::Error) -> CompletionFailure {
    if e.is_builder() {
        CompletionFailure::new(FailureKind::UnknownError, format!("failed to build request: {e}"))
    } else if e.is_timeout() {
        CompletionFailure::new(FailureKind::RequestError, format!("request timed out: {e}"))
    } else {
        CompletionFailure::new(FailureKind::RequestError, e.to_string())
    }
}

/// Pull `choices[0].message.content` out of a 2xx body, unmodified.
fn extract_content(body: &[u8]) -> Result<String, CompletionFailure> {
    let parsed: ChatCompletionResponse = serde_json::from_slice(body).map_err(|e| {
        CompletionFailure::new(FailureKind::ProtocolError, format!("unexpected response format: {e}"))
    })?;

    trace!(choices = parsed.choices.len(), "received completion response");

    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| CompletionFailure::new(FailureKind::ProtocolError, "response has no choices"))?;

    choice.message.content.ok_or_else(|| {
        CompletionFailure::new(FailureKind::ProtocolError, "choices[0].message.content is missing")
    })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    stream: bool,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}
