//! Per-message relay: typing indicator, completion call, chunked reply.

use teloxide::types::{ChatId, UserId};
use tracing::{debug, info, warn};

use crate::llm::{CompletionClient, CompletionResult, FailureKind};

use super::chunk::{MAX_MESSAGE_CHARS, split_message};
use super::transport::ReplyTransport;
use super::RelayError;

/// Sent instead of a reply whenever the completion fails.
pub const APOLOGY_TEXT: &str = "❌ Sorry, I encountered an error while processing your request. \
Please try again in a moment.";

/// Maximum number of characters of user text written to the log.
pub const PREVIEW_CHARS: usize = 50;

/// What the handler ended up sending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    /// The completion text was delivered in `messages` parts.
    Replied { messages: usize },
    /// The apology was sent. `kind` is `None` when the provider returned
    /// empty text, which Telegram would refuse to deliver.
    Apologized { kind: Option<FailureKind> },
}

/// Relay one inbound text message to the completion provider and reply.
///
/// Exactly one completion request is made. A failed typing indicator is
/// logged and ignored; a failed reply send is returned to the caller.
pub async fn relay_text<T: ReplyTransport>(
    transport: &T,
    completion: &CompletionClient,
    chat_id: ChatId,
    sender: Option<UserId>,
    text: &str,
) -> Result<RelayOutcome, RelayError> {
    if let Err(e) = transport.send_typing(chat_id).await {
        warn!(chat_id = chat_id.0, error = %e, "failed to set typing indicator");
    }

    info!(
        chat_id = chat_id.0,
        user_id = ?sender.map(|u| u.0),
        preview = %preview(text, PREVIEW_CHARS),
        "processing message"
    );

    match completion.complete(text).await {
        CompletionResult::Text(content) if !content.is_empty() => {
            let chunks = split_message(&content, MAX_MESSAGE_CHARS);
            let total = chunks.len();
            for (index, chunk) in chunks.into_iter().enumerate() {
                transport.send_text(chat_id, chunk).await?;
                debug!(chat_id = chat_id.0, part = index + 1, total, "reply part sent");
            }
            Ok(RelayOutcome::Replied { messages: total })
        }
        CompletionResult::Text(_) => {
            warn!(chat_id = chat_id.0, "provider returned empty content");
            transport.send_text(chat_id, APOLOGY_TEXT).await?;
            Ok(RelayOutcome::Apologized { kind: None })
        }
        CompletionResult::Failure(failure) => {
            // Detail was already logged by the client; the user only sees the apology.
            transport.send_text(chat_id, APOLOGY_TEXT).await?;
            Ok(RelayOutcome::Apologized { kind: Some(failure.kind) })
        }
    }
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
