//! The two outbound platform operations the relay needs.
//!
//! [`relay_text`](super::handler::relay_text) is generic over this trait so it
//! can run against a live [`Bot`] or an in-memory recorder in tests.

use std::future::Future;

use teloxide::prelude::*;
use teloxide::types::ChatAction;

use super::RelayError;

pub trait ReplyTransport: Send + Sync {
    /// Show the "typing…" indicator in `chat_id`.
    fn send_typing(&self, chat_id: ChatId) -> impl Future<Output = Result<(), RelayError>> + Send;

    /// Send one text message to `chat_id`. `text` must already fit the
    /// platform's size limit.
    fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
    ) -> impl Future<Output = Result<(), RelayError>> + Send;
}

impl ReplyTransport for Bot {
    async fn send_typing(&self, chat_id: ChatId) -> Result<(), RelayError> {
        self.send_chat_action(chat_id, ChatAction::Typing).await?;
        Ok(())
    }

    async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), RelayError> {
        self.send_message(chat_id, text.to_owned()).await?;
        Ok(())
    }
}
