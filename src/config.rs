use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::downloader::supervisor::{PollTiming, DEFAULT_POLL_INTERVAL, DEFAULT_SPINNER_INTERVAL};

/// Runtime configuration for the job runner.
///
/// Defaults match the stock poll cadence; every field can be overridden
/// from the environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobsConfig {
    /// Liveness poll period in milliseconds (default: `500`).
    pub poll_interval_ms: u64,
    /// Spinner frame period in milliseconds (default: `125`).
    pub spinner_interval_ms: u64,
    /// Explicit yt-dlp binary; searched for when unset.
    pub ytdlp_path: Option<PathBuf>,
    /// Where the engine writes files (default: the user's download dir).
    pub output_dir: PathBuf,
    pub proxy: Option<String>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            spinner_interval_ms: DEFAULT_SPINNER_INTERVAL.as_millis() as u64,
            ytdlp_path: None,
            output_dir: dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")),
            proxy: None,
        }
    }
}

impl JobsConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default            |
    /// |------------------------|--------------------|
    /// | `YTDL_JOBS_POLL_MS`    | `500`              |
    /// | `YTDL_JOBS_SPINNER_MS` | `125`              |
    /// | `YTDL_JOBS_YTDLP`      | searched on PATH   |
    /// | `YTDL_JOBS_OUTPUT_DIR` | download directory |
    /// | `YTDL_JOBS_PROXY`      | none               |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let millis = |key: &str, default: u64| match non_empty(key) {
            Some(raw) => raw.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(key, value = %raw, "ignoring unparseable interval");
                default
            }),
            None => default,
        };

        Self {
            poll_interval_ms: millis("YTDL_JOBS_POLL_MS", defaults.poll_interval_ms),
            spinner_interval_ms: millis("YTDL_JOBS_SPINNER_MS", defaults.spinner_interval_ms),
            ytdlp_path: non_empty("YTDL_JOBS_YTDLP").map(PathBuf::from),
            output_dir: non_empty("YTDL_JOBS_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            proxy: non_empty("YTDL_JOBS_PROXY"),
        }
    }

    /// Timer periods for the consumer loop. Zero becomes one millisecond.
    pub fn timing(&self) -> PollTiming {
        PollTiming {
            poll: Duration::from_millis(self.poll_interval_ms.max(1)),
            spinner: Duration::from_millis(self.spinner_interval_ms.max(1)),
        }
    }
}
