// Retrieval engine trait definition

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::errors::DownloadError;
use super::events::EventSender;
use super::models::{EngineOptions, Severity};

/// Log sink handed to an engine for the duration of one download
pub trait EngineLogger: Send + Sync {
    fn debug(&self, msg: &str);
    fn warning(&self, msg: &str);
    fn error(&self, msg: &str);
}

/// External engine that performs the actual retrieval
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    /// Name of the engine (for logging)
    fn name(&self) -> &'static str;

    /// Download `target` with the given options.
    ///
    /// Every message the engine produces goes to `logger`. Retries are the
    /// engine's business, driven by `options.retries`. When `cancel` fires
    /// the engine should stop and return `DownloadError::Cancelled`.
    async fn download(
        &self,
        target: &str,
        options: &EngineOptions,
        logger: &dyn EngineLogger,
        cancel: CancellationToken,
    ) -> Result<(), DownloadError>;
}

/// Forwards engine messages into a job's event channel, tagged by severity
pub struct ChannelLogger {
    events: EventSender,
}

impl ChannelLogger {
    pub fn new(events: EventSender) -> Self {
        Self { events }
    }
}

impl EngineLogger for ChannelLogger {
    fn debug(&self, msg: &str) {
        self.events.emit_line(Severity::Debug, msg);
    }

    fn warning(&self, msg: &str) {
        self.events.emit_line(Severity::Warning, msg);
    }

    fn error(&self, msg: &str) {
        self.events.emit_line(Severity::Error, msg);
    }
}
