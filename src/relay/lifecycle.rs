//! Relay lifecycle phases.
//!
//! Phases only move forward: `Created → Started → Running → Stopping → Stopped`.
//! A startup failure jumps from `Started` straight to `Stopping`; nothing ever
//! moves back. The current phase is published on a `watch` channel so other
//! tasks can observe transitions.

use std::fmt;

use tokio::sync::watch;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Created,
    Started,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Created => "created",
            Phase::Started => "started",
            Phase::Running => "running",
            Phase::Stopping => "stopping",
            Phase::Stopped => "stopped",
        };
        f.write_str(s)
    }
}

#[derive(Debug)]
pub struct Lifecycle {
    tx: watch::Sender<Phase>,
}

impl Lifecycle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Phase::Created);
        Self { tx }
    }

    pub fn phase(&self) -> Phase {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.tx.subscribe()
    }

    /// Move to `to`. Fails if `to` is not strictly after the current phase.
    pub fn advance(&self, to: Phase) -> Result<(), AppError> {
        let mut from = to;
        let moved = self.tx.send_if_modified(|current| {
            from = *current;
            if to > *current {
                *current = to;
                true
            } else {
                false
            }
        });
        if moved {
            Ok(())
        } else {
            Err(AppError::Lifecycle(format!("invalid transition {from} -> {to}")))
        }
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
