// Error types for download jobs and engines

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DownloadError {
    /// A job is already running on this supervisor
    #[error("A download job is already running")]
    AlreadyRunning,

    /// yt-dlp (or another engine binary) not found in system
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// Command execution failed
    #[error("Execution error: {0}")]
    ExecutionError(String),

    /// Network timeout while talking to the remote site
    #[error("Network timeout: the remote site is not responding")]
    NetworkTimeout,

    /// The remote site refused the request (403, 429, bot detection, etc.)
    #[error("Request blocked: {0}")]
    Blocked(String),

    /// Target identifier the engine cannot handle
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Job was cancelled before the engine finished
    #[error("Download cancelled")]
    Cancelled,

    /// The engine panicked inside the worker thread
    #[error("Engine panicked: {0}")]
    Panicked(String),

    /// Unknown error with details
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Classify raw engine stderr
impl From<String> for DownloadError {
    fn from(s: String) -> Self {
        let lower = s.to_lowercase();

        if lower.contains("timeout") || lower.contains("timed out") {
            return Self::NetworkTimeout;
        }

        if lower.contains("403") || lower.contains("429") || lower.contains("bot") || lower.contains("blocked") {
            return Self::Blocked(s);
        }

        if lower.contains("not found") || lower.contains("no such file") || lower.contains("command not found") {
            return Self::ToolNotFound(s);
        }

        if lower.contains("invalid url") || lower.contains("unsupported url") || lower.contains("is not a valid url") {
            return Self::InvalidUrl(s);
        }

        Self::Unknown(s)
    }
}

impl From<&str> for DownloadError {
    fn from(s: &str) -> Self {
        Self::from(s.to_string())
    }
}
