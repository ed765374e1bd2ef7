// Scripted engine for unit tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use super::errors::DownloadError;
use super::models::{EngineOptions, Severity};
use super::traits::{EngineLogger, RetrievalEngine};

#[derive(Default)]
pub struct FakeEngine {
    lines: Vec<(Severity, String)>,
    failure: Option<DownloadError>,
    panic_message: Option<&'static str>,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
    last_options: Arc<Mutex<Option<EngineOptions>>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_line(mut self, severity: Severity, line: &str) -> Self {
        self.lines.push((severity, line.to_string()));
        self
    }

    pub fn failing(mut self, error: DownloadError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn panicking(mut self, message: &'static str) -> Self {
        self.panic_message = Some(message);
        self
    }

    /// Block inside `download` until the returned handle is notified
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    pub fn last_options(&self) -> Arc<Mutex<Option<EngineOptions>>> {
        self.last_options.clone()
    }
}

#[async_trait]
impl RetrievalEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn download(
        &self,
        _target: &str,
        options: &EngineOptions,
        logger: &dyn EngineLogger,
        cancel: CancellationToken,
    ) -> Result<(), DownloadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock().unwrap() = Some(options.clone());

        for (severity, line) in &self.lines {
            match severity {
                Severity::Debug => logger.debug(line),
                Severity::Warning => logger.warning(line),
                Severity::Error => logger.error(line),
            }
        }

        if let Some(gate) = &self.gate {
            tokio::select! {
                _ = gate.notified() => {}
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            }
        }

        if let Some(message) = self.panic_message {
            panic!("{}", message);
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
