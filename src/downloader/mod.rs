// Downloader module - background jobs, event relay and liveness supervision

pub mod backends;
pub mod diagnostics;
pub mod errors;
pub mod events;
pub mod job;
pub mod models;
pub mod profiles;
pub mod spinner;
pub mod supervisor;
pub mod traits;
pub mod utils;

#[cfg(test)]
mod testing;

pub use backends::YtDlpEngine;
pub use errors::DownloadError;
pub use events::{event_channel, EventReceiver, EventSender};
pub use job::{effective_options, DownloadJob};
pub use models::{
    DownloadProfile, EngineOptions, IgnoreErrorsMode, JobOutcome, JobRequest, JobState, LogEvent,
    PostProcessorStep, Severity,
};
pub use profiles::{ProfileRegistry, DEFAULT_PROFILE};
pub use spinner::LoadingIndicator;
pub use supervisor::{JobSupervisor, JobUpdate, PollStatus, PollTiming};
pub use traits::{ChannelLogger, EngineLogger, RetrievalEngine};
