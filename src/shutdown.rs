//! Process signal handling.
//!
//! Signals only cancel a [`CancellationToken`]; the relay's own run loop
//! notices the cancellation and performs the shutdown sequence.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Spawn a task that cancels `token` on SIGINT or SIGTERM.
///
/// The task also exits quietly if `token` is cancelled by someone else.
pub fn spawn_signal_watcher(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = token.cancelled() => {}
            res = wait_for_signal() => match res {
                Ok(name) => {
                    info!(signal = name, "shutdown signal received");
                    token.cancel();
                }
                Err(e) => error!(error = %e, "failed to install signal handler"),
            },
        }
    })
}

/// Resolve with the name of the first termination signal received.
#[cfg(unix)]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = term.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl-c")
}
