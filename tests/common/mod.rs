//! Shared fixtures: local stand-ins for the completion provider and the
//! Telegram Bot API, an in-memory reply transport and a log capture.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::post;
use teloxide::ApiError;
use teloxide::types::ChatId;
use tracing_subscriber::fmt::MakeWriter;

use relay_bot::config::ProviderConfig;
use relay_bot::llm::CompletionClient;
use relay_bot::relay::RelayError;
use relay_bot::relay::transport::ReplyTransport;

// ── Completion provider stand-in ─────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: serde_json::Value,
}

struct ProviderState {
    status: u16,
    body: String,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

pub struct MockProvider {
    pub base_url: String,
    state: Arc<ProviderState>,
}

impl MockProvider {
    /// Serve `POST /v1/chat/completions` with a fixed status and raw body.
    pub async fn start(status: u16, body: impl Into<String>) -> Self {
        Self::start_with_delay(status, body, None).await
    }

    pub async fn start_with_delay(status: u16, body: impl Into<String>, delay: Option<Duration>) -> Self {
        let state = Arc::new(ProviderState {
            status,
            body: body.into(),
            delay,
            requests: Mutex::new(Vec::new()),
        });
        let app = Router::new()
            .route("/v1/chat/completions", post(provider_handler))
            .with_state(state.clone());
        let addr = serve(app).await;
        Self { base_url: format!("http://{addr}/v1"), state }
    }

    /// 200 with a well-formed completion whose content is `content`.
    pub async fn replying(content: &str) -> Self {
        Self::start(200, completion_body(content)).await
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig {
            base_url: self.base_url.clone(),
            api_key: "sk-test".into(),
            model: "deepseek-chat".into(),
        }
    }

    pub fn client(&self) -> CompletionClient {
        CompletionClient::new(&self.provider_config()).unwrap()
    }

    /// Resolve once at least one request has arrived.
    pub async fn wait_for_request(&self) {
        while self.state.requests.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

pub fn completion_body(content: &str) -> String {
    serde_json::json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "model": "deepseek-chat",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }],
        "usage": { "prompt_tokens": 10, "completion_tokens": 3, "total_tokens": 13 }
    })
    .to_string()
}

async fn provider_handler(
    State(state): State<Arc<ProviderState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header_str = |name| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    state.requests.lock().unwrap().push(RecordedRequest {
        authorization: header_str(header::AUTHORIZATION),
        content_type: header_str(header::CONTENT_TYPE),
        body: serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null),
    });
    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }
    (
        StatusCode::from_u16(state.status).unwrap(),
        [(header::CONTENT_TYPE, "application/json")],
        state.body.clone(),
    )
}

/// An address nothing listens on.
pub async fn refused_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/v1")
}

// ── Telegram Bot API stand-in ────────────────────────────────────────────────

/// One Bot API call: lowercased method name and its JSON parameters.
#[derive(Debug, Clone)]
pub struct BotCall {
    pub method: String,
    pub params: serde_json::Value,
}

struct TelegramState {
    authorized: bool,
    pending: Mutex<VecDeque<serde_json::Value>>,
    calls: Mutex<Vec<BotCall>>,
}

pub struct MockTelegram {
    pub api_url: String,
    state: Arc<TelegramState>,
}

impl MockTelegram {
    /// Accepts every method: `getMe` succeeds and `getUpdates` is always empty.
    pub async fn healthy() -> Self {
        Self::start(true, Vec::new()).await
    }

    /// Like [`Self::healthy`], but the first `getUpdates` delivers `updates`.
    pub async fn with_updates(updates: Vec<serde_json::Value>) -> Self {
        Self::start(true, updates).await
    }

    /// Rejects every method with 401, like Telegram does for a bad token.
    pub async fn unauthorized() -> Self {
        Self::start(false, Vec::new()).await
    }

    async fn start(authorized: bool, updates: Vec<serde_json::Value>) -> Self {
        let state = Arc::new(TelegramState {
            authorized,
            pending: Mutex::new(updates.into()),
            calls: Mutex::new(Vec::new()),
        });
        let app = Router::new().fallback(telegram_handler).with_state(state.clone());
        let addr = serve(app).await;
        Self { api_url: format!("http://{addr}/"), state }
    }

    /// Bot API method names called so far, lowercased, in order.
    pub fn calls(&self) -> Vec<String> {
        self.state.calls.lock().unwrap().iter().map(|c| c.method.clone()).collect()
    }

    /// Resolve once `count` messages have been sent.
    pub async fn wait_for_sends(&self, count: usize) {
        while self.sent_messages().len() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Parameters of every `sendMessage` call, in order.
    pub fn sent_messages(&self) -> Vec<serde_json::Value> {
        self.state
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.method == "sendmessage")
            .map(|c| c.params.clone())
            .collect()
    }
}

/// A private-chat text update as Telegram delivers it. Leading `/word`
/// text is tagged with a `bot_command` entity, like the real server does.
pub fn text_update(update_id: i32, chat_id: i64, text: &str) -> serde_json::Value {
    let mut message = serde_json::json!({
        "message_id": update_id * 10,
        "date": 1_700_000_000,
        "chat": { "id": chat_id, "type": "private", "first_name": "Ada" },
        "from": { "id": 7, "is_bot": false, "first_name": "Ada" },
        "text": text
    });
    let command = text.split(' ').next().filter(|w| w.len() > 1 && w.starts_with('/'));
    if let Some(command) = command {
        let length = command.encode_utf16().count();
        message["entities"] = serde_json::json!([{ "type": "bot_command", "offset": 0, "length": length }]);
    }
    serde_json::json!({ "update_id": update_id, "message": message })
}

// teloxide names methods in PascalCase on the wire (`/bot<token>/GetMe`).
async fn telegram_handler(State(state): State<Arc<TelegramState>>, uri: Uri, body: Bytes) -> impl IntoResponse {
    let method = uri.path().rsplit('/').next().unwrap_or_default().to_ascii_lowercase();
    let params = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    state.calls.lock().unwrap().push(BotCall { method: method.clone(), params });

    if !state.authorized {
        let body = serde_json::json!({ "ok": false, "error_code": 401, "description": "Unauthorized" });
        return (StatusCode::UNAUTHORIZED, axum::Json(body));
    }

    let result = match method.as_str() {
        "getme" => serde_json::json!({
            "id": 42,
            "is_bot": true,
            "first_name": "Relay",
            "username": "relay_test_bot",
            "can_join_groups": true,
            "can_read_all_group_messages": false,
            "supports_inline_queries": false,
            "can_connect_to_business": false,
            "has_main_web_app": false
        }),
        "getwebhookinfo" => serde_json::json!({
            "url": "",
            "has_custom_certificate": false,
            "pending_update_count": 0
        }),
        "getupdates" => {
            let batch: Vec<_> = state.pending.lock().unwrap().drain(..).collect();
            if batch.is_empty() {
                // Stands in for a short long-poll.
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            serde_json::Value::Array(batch)
        }
        "sendmessage" => serde_json::json!({
            "message_id": 9000,
            "date": 1_700_000_001,
            "chat": { "id": 1001, "type": "private", "first_name": "Ada" },
            "from": { "id": 42, "is_bot": true, "first_name": "Relay" },
            "text": "ok"
        }),
        _ => serde_json::json!(true),
    };
    (StatusCode::OK, axum::Json(serde_json::json!({ "ok": true, "result": result })))
}

async fn serve(app: Router) -> std::net::SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

// ── In-memory transport ──────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(ChatId, String)>>,
    pub typing: Mutex<Vec<ChatId>>,
    /// Typing indicator calls fail.
    pub fail_typing: bool,
    /// Text sends fail once this many have succeeded.
    pub fail_after: Option<usize>,
}

impl RecordingTransport {
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().unwrap().iter().map(|(_, t)| t.clone()).collect()
    }
}

impl ReplyTransport for RecordingTransport {
    async fn send_typing(&self, chat_id: ChatId) -> Result<(), RelayError> {
        if self.fail_typing {
            return Err(RelayError::Telegram(ApiError::BotBlocked.into()));
        }
        self.typing.lock().unwrap().push(chat_id);
        Ok(())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError> {
        let mut sent = self.sent.lock().unwrap();
        if self.fail_after.is_some_and(|n| sent.len() >= n) {
            return Err(RelayError::Telegram(ApiError::MessageTextIsEmpty.into()));
        }
        sent.push((chat_id, text.to_string()));
        Ok(())
    }
}

// ── Log capture ──────────────────────────────────────────────────────────────

/// Collects formatted log output in memory.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Install a thread-local subscriber writing here until the guard drops.
    /// Use from a current-thread `#[tokio::test]` so every task logs into it.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
