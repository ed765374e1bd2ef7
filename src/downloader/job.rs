//! Download job - one engine invocation on a dedicated worker thread.
//!
//! The job owns everything it touches: the request, its effective engine
//! options and the producer half of the event channel. The only things
//! visible from outside while it runs are the channel and the thread's
//! liveness.
//!
//! # Failure handling
//!
//! Engine errors and engine panics are both caught. Either way exactly one
//! `ERROR:` line describing the failure is emitted and the thread returns
//! normally, so a liveness poll always observes completion.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio_util::sync::CancellationToken;

use super::diagnostics::annotate_failure;
use super::errors::DownloadError;
use super::events::EventSender;
use super::models::{DownloadProfile, EngineOptions, JobOutcome, JobRequest};
use super::traits::{ChannelLogger, EngineLogger, RetrievalEngine};

/// Profile copy plus the subtitle overlay when requested.
/// The stored profile is never touched.
pub fn effective_options(request: &JobRequest, profile: &DownloadProfile) -> EngineOptions {
    let options = EngineOptions::from_profile(profile);
    if request.include_subtitles {
        options.with_subtitle_overlay()
    } else {
        options
    }
}

pub struct DownloadJob {
    request: JobRequest,
    options: EngineOptions,
    engine: Arc<dyn RetrievalEngine>,
    events: EventSender,
    cancel: CancellationToken,
}

impl DownloadJob {
    pub fn new(
        request: JobRequest,
        profile: &DownloadProfile,
        engine: Arc<dyn RetrievalEngine>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Self {
        let options = effective_options(&request, profile);
        Self {
            request,
            options,
            engine,
            events,
            cancel,
        }
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Run the job on its own thread
    pub fn spawn(self) -> Result<JoinHandle<JobOutcome>, DownloadError> {
        thread::Builder::new()
            .name("ytdl-job".to_string())
            .spawn(move || self.run())
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to spawn worker thread: {}", e)))
    }

    /// Job body. Blocks for the whole engine call.
    ///
    /// Must not be called from inside a tokio runtime: the job drives the
    /// engine future on a runtime of its own.
    pub fn run(self) -> JobOutcome {
        let logger = ChannelLogger::new(self.events.clone());

        match serde_json::to_string(&self.options) {
            Ok(json) => tracing::debug!(engine = self.engine.name(), options = %json, "effective engine configuration"),
            Err(e) => tracing::debug!(engine = self.engine.name(), "could not serialize engine options: {}", e),
        }
        tracing::info!(
            target_identifier = %self.request.target_identifier,
            profile = %self.request.profile_name,
            subtitles = self.request.include_subtitles,
            "job started"
        );

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.invoke(&logger)))
            .unwrap_or_else(|payload| Err(DownloadError::Panicked(panic_message(payload.as_ref()))));

        let outcome = match result {
            Ok(()) => JobOutcome::Completed,
            Err(DownloadError::Cancelled) => {
                logger.warning("Download cancelled");
                JobOutcome::Cancelled
            }
            Err(e) => {
                let message = annotate_failure(&e.to_string());
                logger.error(&message);
                tracing::warn!(engine = self.engine.name(), "job failed: {}", message);
                JobOutcome::Failed(message)
            }
        };

        tracing::info!(?outcome, "job finished");
        outcome
    }

    fn invoke(&self, logger: &ChannelLogger) -> Result<(), DownloadError> {
        if self.cancel.is_cancelled() {
            return Err(DownloadError::Cancelled);
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DownloadError::ExecutionError(format!("Failed to start job runtime: {}", e)))?;

        runtime.block_on(self.engine.download(
            &self.request.target_identifier,
            &self.options,
            logger,
            self.cancel.clone(),
        ))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
