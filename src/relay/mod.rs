//! Relay dispatcher: owns the Telegram session and the completion client.
//!
//! [`RelayDispatcher::new`] wires everything without touching the network.
//! [`RelayDispatcher::run`] drives the whole lifecycle:
//!
//!   1. `Started`: verify the bot token with `getMe`. Failure is fatal.
//!   2. `Running`: long-poll updates; each chat is handled on its own task.
//!   3. `Stopping`: once `shutdown` is cancelled, stop polling and wait for
//!      in-flight handlers to finish.
//!   4. `Stopped`: drop the Telegram session, then close the completion client.

pub mod chunk;
pub mod commands;
pub mod handler;
pub mod lifecycle;
pub mod transport;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use teloxide::dispatching::{DefaultKey, HandlerExt, ShutdownToken, UpdateFilterExt, UpdateHandler};
use teloxide::error_handlers::LoggingErrorHandler;
use teloxide::prelude::*;
use teloxide::types::ChatId;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::AppError;
use crate::llm::CompletionClient;

use commands::Command;
use handler::{RelayOutcome, relay_text};
use lifecycle::{Lifecycle, Phase};

/// How often a pending shutdown re-checks whether polling has begun.
const SHUTDOWN_RETRY: Duration = Duration::from_millis(50);

// ── Errors ───────────────────────────────────────────────────────────────────

/// Failure while handling a single update. Logged, never fatal.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("telegram request failed: {0}")]
    Telegram(#[from] teloxide::RequestError),
}

// ── RelayDispatcher ──────────────────────────────────────────────────────────

pub struct RelayDispatcher {
    bot: Bot,
    completion: Arc<CompletionClient>,
    dispatcher: Dispatcher<Bot, RelayError, DefaultKey>,
    lifecycle: Arc<Lifecycle>,
}

impl RelayDispatcher {
    /// Build the completion client, the bot handle and the handler tree.
    /// No network I/O happens here.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let completion = Arc::new(CompletionClient::new(&config.provider)?);

        let mut bot = Bot::new(config.bot_token.clone());
        if let Some(url) = &config.bot_api_url {
            bot = bot.set_api_url(url.clone());
        }

        let dispatcher = Dispatcher::builder(bot.clone(), schema())
            .dependencies(dptree::deps![completion.clone()])
            .default_handler(|upd| async move {
                debug!(update_id = ?upd.id, "ignoring unhandled update");
            })
            .error_handler(LoggingErrorHandler::with_custom_text("error in relay handler"))
            .build();

        debug!(model = %completion.model(), url = %completion.url(), "relay dispatcher created");

        Ok(Self { bot, completion, dispatcher, lifecycle: Arc::new(Lifecycle::new()) })
    }

    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Watch lifecycle transitions, including those made inside [`Self::run`].
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.lifecycle.subscribe()
    }

    pub fn completion(&self) -> Arc<CompletionClient> {
        self.completion.clone()
    }

    /// Run until `shutdown` is cancelled, then stop both clients in order.
    ///
    /// Returns an error if the Telegram session cannot be initialised or if
    /// polling ends without a shutdown request. Both clients are released
    /// on every path.
    pub async fn run(self, shutdown: CancellationToken) -> Result<(), AppError> {
        let Self { bot, completion, mut dispatcher, lifecycle } = self;

        lifecycle.advance(Phase::Started)?;
        info!("starting relay");

        let me = match bot.get_me().await {
            Ok(me) => me,
            Err(e) => {
                error!(error = %e, "failed to initialise telegram session");
                lifecycle.advance(Phase::Stopping)?;
                drop(dispatcher);
                drop(bot);
                finish(&lifecycle, &completion)?;
                return Err(AppError::Telegram(format!("failed to initialise bot session: {e}")));
            }
        };
        info!(username = ?me.user.username, "telegram session ready");

        let dispatch_done = CancellationToken::new();
        lifecycle.advance(Phase::Running)?;
        let watcher = tokio::spawn(forward_shutdown(
            shutdown.clone(),
            dispatcher.shutdown_token(),
            dispatch_done.clone(),
            lifecycle.clone(),
        ));

        info!(model = %completion.model(), "relay running, polling for messages");
        // Returns once polling has stopped and every in-flight handler is done.
        dispatcher.dispatch().await;
        dispatch_done.cancel();
        if let Err(e) = watcher.await {
            warn!(error = %e, "shutdown watcher task failed");
        }

        let unexpected = lifecycle.phase() < Phase::Stopping;
        if unexpected {
            warn!("telegram dispatcher exited without a shutdown request");
            lifecycle.advance(Phase::Stopping)?;
        }

        drop(dispatcher);
        drop(bot);
        info!("telegram session released");

        finish(&lifecycle, &completion)?;

        if unexpected {
            return Err(AppError::Telegram("dispatcher exited unexpectedly".into()));
        }
        Ok(())
    }
}

/// Close the completion pool and enter `Stopped`.
fn finish(lifecycle: &Lifecycle, completion: &CompletionClient) -> Result<(), AppError> {
    completion.close();
    lifecycle.advance(Phase::Stopped)?;
    info!("relay stopped");
    Ok(())
}

/// Wait for `shutdown`, then ask the dispatcher to stop and wait until it has.
///
/// The dispatcher refuses a shutdown request before it starts polling, so the
/// request is retried until it is accepted or dispatching is over.
async fn forward_shutdown(
    shutdown: CancellationToken,
    stop: ShutdownToken,
    dispatch_done: CancellationToken,
    lifecycle: Arc<Lifecycle>,
) {
    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = dispatch_done.cancelled() => return,
    }

    if lifecycle.advance(Phase::Stopping).is_ok() {
        info!("shutdown requested, no longer accepting updates");
    }

    loop {
        match stop.shutdown() {
            Ok(stopped) => {
                stopped.await;
                debug!("telegram polling stopped");
                return;
            }
            Err(_idle) => {
                tokio::select! {
                    _ = dispatch_done.cancelled() => return,
                    _ = tokio::time::sleep(SHUTDOWN_RETRY) => {}
                }
            }
        }
    }
}

// ── Handler tree ─────────────────────────────────────────────────────────────

/// `/start` and `/help`, then every other non-command text message.
pub fn schema() -> UpdateHandler<RelayError> {
    Update::filter_message()
        .branch(dptree::entry().filter_command::<Command>().endpoint(on_command))
        .branch(
            dptree::filter(|msg: Message| {
                msg.text().is_some() && !commands::starts_with_bot_command(msg.entities())
            })
            .endpoint(on_text),
        )
}

async fn on_command(bot: Bot, msg: Message, cmd: Command) -> Result<(), RelayError> {
    debug!(chat_id = msg.chat.id.0, command = ?cmd, "command received");
    bot.send_message(msg.chat.id, cmd.reply()).await?;
    Ok(())
}

/// Endpoint for plain text. Errors and panics stop here so one bad update
/// cannot take down the dispatcher or another chat's handler.
async fn on_text(bot: Bot, msg: Message, completion: Arc<CompletionClient>) -> Result<(), RelayError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    let chat_id = msg.chat.id;
    let sender = msg.from.as_ref().map(|u| u.id);

    confine(chat_id, relay_text(&bot, &completion, chat_id, sender, text)).await;
    Ok(())
}

/// Drive one handler future to completion, logging its error or panic.
///
/// Returns the outcome only when the handler finished cleanly.
async fn confine<F>(chat_id: ChatId, work: F) -> Option<RelayOutcome>
where
    F: Future<Output = Result<RelayOutcome, RelayError>>,
{
    match AssertUnwindSafe(work).catch_unwind().await {
        Ok(Ok(outcome)) => {
            match &outcome {
                RelayOutcome::Replied { messages } => {
                    debug!(chat_id = chat_id.0, messages, "reply delivered");
                }
                RelayOutcome::Apologized { kind } => {
                    debug!(chat_id = chat_id.0, kind = ?kind, "apology delivered");
                }
            }
            Some(outcome)
        }
        Ok(Err(e)) => {
            error!(chat_id = chat_id.0, error = %e, "failed to relay message");
            None
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "<non-string panic>".to_string());
            error!(chat_id = chat_id.0, %reason, "message handler panicked");
            None
        }
    }
}
