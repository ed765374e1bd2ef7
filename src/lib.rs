//! Background download jobs with a streamed log relay and a liveness-poll
//! supervisor. The retrieval itself is delegated to an external engine
//! (yt-dlp by default).

pub mod config;
pub mod downloader;

pub use config::JobsConfig;
pub use downloader::{
    DownloadError, EventReceiver, JobOutcome, JobRequest, JobSupervisor, JobUpdate, LogEvent, PollTiming,
    ProfileRegistry, RetrievalEngine, YtDlpEngine,
};
