//! Event relay between a worker thread and the consumer.
//!
//! An unbounded FIFO built on `tokio::sync::mpsc`. The sending half never
//! blocks and never reports failure to the worker; a dropped receiver just
//! means nobody is listening any more. The receiving half can be awaited
//! from an async loop or drained on a UI tick.

use tokio::sync::mpsc::{self, error::TryRecvError};

use super::models::{LogEvent, Severity};

/// Create a fresh channel for one job
pub fn event_channel() -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSender { tx }, EventReceiver { rx })
}

/// Producer half. Cheap to clone, so several producers may share a channel.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<LogEvent>,
}

impl EventSender {
    /// Best-effort emit: delivery failures are swallowed
    pub fn emit(&self, event: LogEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("event receiver dropped, discarding log line");
        }
    }

    pub fn emit_line(&self, severity: Severity, message: &str) {
        self.emit(LogEvent::new(severity, message));
    }

    /// True once the consumer has dropped its receiver
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half
#[derive(Debug)]
pub struct EventReceiver {
    rx: mpsc::UnboundedReceiver<LogEvent>,
}

impl EventReceiver {
    /// Wait for the next event. `None` once every sender is gone and the
    /// queue is empty.
    pub async fn recv(&mut self) -> Option<LogEvent> {
        self.rx.recv().await
    }

    /// Next queued event without waiting
    pub fn try_next(&mut self) -> Option<LogEvent> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything queued right now, in emission order
    pub fn drain(&mut self) -> Vec<LogEvent> {
        std::iter::from_fn(|| self.try_next()).collect()
    }

    /// True when no sender is left and nothing is queued
    pub fn is_finished(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}
