//! Chat-completion client and its result types.
//!
//! The client never returns a Rust error from [`CompletionClient::complete`];
//! every failure mode is folded into [`CompletionResult::Failure`] with a
//! [`FailureKind`] tag so callers can branch without matching on transport
//! internals.

pub mod client;

use std::fmt;

pub use client::CompletionClient;

// ── Result types ──────────────────────────────────────────────────────────────

/// Classification of a failed completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Network or transport failure: connect refused, DNS, timeout.
    RequestError,
    /// Provider answered with a non-2xx status.
    HttpError,
    /// 2xx answer whose body does not have the expected shape.
    ProtocolError,
    /// Anything else.
    UnknownError,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::RequestError => "RequestError",
            FailureKind::HttpError => "HTTPError",
            FailureKind::ProtocolError => "ProtocolError",
            FailureKind::UnknownError => "UnknownError",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a completion failed. `detail` is for logs only, never for end users.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionFailure {
    pub kind: FailureKind,
    pub detail: String,
}

impl CompletionFailure {
    pub fn new(kind: FailureKind, detail: impl Into<String>) -> Self {
        Self { kind, detail: detail.into() }
    }
}

impl fmt::Display for CompletionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Outcome of one completion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionResult {
    Text(String),
    Failure(CompletionFailure),
}

impl CompletionResult {
    pub fn is_text(&self) -> bool {
        matches!(self, CompletionResult::Text(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CompletionResult::Text(_) => None,
            CompletionResult::Failure(f) => Some(f.kind),
        }
    }
}
