// Common data models for download jobs

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

/// Subtitle format written when a request asks for subtitles
pub const SUBTITLE_FORMAT: &str = "srt";

/// How the engine treats per-item failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreErrorsMode {
    /// Abort on the first error
    None,
    /// Skip items whose download failed, keep going with the rest
    SkipFailedDownloadOnly,
}

// Serialized the way the engine reads it: `false` or "only_download"
impl Serialize for IgnoreErrorsMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_bool(false),
            Self::SkipFailedDownloadOnly => serializer.serialize_str("only_download"),
        }
    }
}

/// Opaque post-processing step passed through to the engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostProcessorStep {
    pub key: String,
    pub only_multi_video: bool,
    /// Trigger, e.g. "playlist"
    pub when: String,
}

impl PostProcessorStep {
    /// Concatenate the items of a collection into one file
    pub fn concat_playlist() -> Self {
        Self {
            key: "FFmpegConcat".to_string(),
            only_multi_video: true,
            when: "playlist".to_string(),
        }
    }

    pub fn is_playlist_concat(&self) -> bool {
        self.key == "FFmpegConcat" && self.when == "playlist"
    }
}

/// Named download preset. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadProfile {
    pub name: String,
    /// Format selection rule, passed to the engine untouched
    pub format_rule: String,
    /// Applies to both fragment and whole-item retries
    pub retry_count: u32,
    pub ignore_errors: IgnoreErrorsMode,
    pub postprocessing_steps: Vec<PostProcessorStep>,
    /// Playlist flattening policy, passed to the engine untouched
    pub extract_flat: String,
}

/// What the consumer asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRequest {
    pub target_identifier: String,
    pub profile_name: String,
    pub include_subtitles: bool,
}

impl JobRequest {
    pub fn new(target_identifier: impl Into<String>, profile_name: impl Into<String>) -> Self {
        Self {
            target_identifier: target_identifier.into(),
            profile_name: profile_name.into(),
            include_subtitles: false,
        }
    }

    pub fn with_subtitles(mut self, enabled: bool) -> Self {
        self.include_subtitles = enabled;
        self
    }
}

/// Effective configuration handed to the engine.
///
/// Field names match the engine's option keys so the struct serializes
/// straight into its configuration bag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineOptions {
    pub extract_flat: String,
    pub format: String,
    pub retries: u32,
    pub fragment_retries: u32,
    pub ignoreerrors: IgnoreErrorsMode,
    pub postprocessors: Vec<PostProcessorStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub writeautomaticsub: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitlesformat: Option<String>,
}

impl EngineOptions {
    /// Copy a profile into a fresh option set
    pub fn from_profile(profile: &DownloadProfile) -> Self {
        Self {
            extract_flat: profile.extract_flat.clone(),
            format: profile.format_rule.clone(),
            retries: profile.retry_count,
            fragment_retries: profile.retry_count,
            ignoreerrors: profile.ignore_errors,
            postprocessors: profile.postprocessing_steps.clone(),
            writeautomaticsub: None,
            subtitlesformat: None,
        }
    }

    /// Overlay automatic-subtitle extraction
    pub fn with_subtitle_overlay(mut self) -> Self {
        self.writeautomaticsub = Some(true);
        self.subtitlesformat = Some(SUBTITLE_FORMAT.to_string());
        self
    }

    pub fn has_subtitle_overlay(&self) -> bool {
        self.writeautomaticsub == Some(true)
    }
}

/// Severity prefix of a log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Debug,
    Warning,
    Error,
}

impl Severity {
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Debug => "DEBUG:",
            Self::Warning => "WARNING:",
            Self::Error => "ERROR:",
        }
    }
}

/// A single line of job output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub line: String,
}

impl LogEvent {
    pub fn new(severity: Severity, message: &str) -> Self {
        Self {
            line: format!("{} {}", severity.prefix(), message),
        }
    }

    /// Severity read back from the line prefix
    pub fn severity(&self) -> Option<Severity> {
        [Severity::Debug, Severity::Warning, Severity::Error]
            .into_iter()
            .find(|s| self.line.starts_with(s.prefix()))
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Some(Severity::Error)
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.line)
    }
}

/// Lifecycle of one job handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    NotStarted,
    Running,
    Finished,
}

/// How a job ended, handed to the consumer with the completion notice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    Completed,
    Failed(String),
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> DownloadProfile {
        DownloadProfile {
            name: "sample".to_string(),
            format_rule: "w".to_string(),
            retry_count: 3,
            ignore_errors: IgnoreErrorsMode::None,
            postprocessing_steps: vec![PostProcessorStep::concat_playlist()],
            extract_flat: "discard_in_playlist".to_string(),
        }
    }

    #[test]
    fn test_options_copy_profile_fields() {
        let options = EngineOptions::from_profile(&sample_profile());
        assert_eq!(options.format, "w");
        assert_eq!(options.retries, 3);
        assert_eq!(options.fragment_retries, 3);
        assert!(!options.has_subtitle_overlay());
        assert_eq!(options.subtitlesformat, None);
    }

    #[test]
    fn test_options_serialize_as_engine_keys() {
        let options = EngineOptions::from_profile(&sample_profile()).with_subtitle_overlay();
        let json = serde_json::to_value(&options).unwrap();

        assert_eq!(json["ignoreerrors"], serde_json::json!(false));
        assert_eq!(json["writeautomaticsub"], serde_json::json!(true));
        assert_eq!(json["subtitlesformat"], serde_json::json!("srt"));
        assert_eq!(json["postprocessors"][0]["key"], serde_json::json!("FFmpegConcat"));
        assert_eq!(json["postprocessors"][0]["when"], serde_json::json!("playlist"));
    }

    #[test]
    fn test_subtitle_keys_omitted_without_overlay() {
        let json = serde_json::to_value(EngineOptions::from_profile(&sample_profile())).unwrap();
        assert!(json.get("writeautomaticsub").is_none());
        assert!(json.get("subtitlesformat").is_none());
    }

    #[test]
    fn test_skip_failed_serializes_as_only_download() {
        let json = serde_json::to_value(IgnoreErrorsMode::SkipFailedDownloadOnly).unwrap();
        assert_eq!(json, serde_json::json!("only_download"));
    }

    #[test]
    fn test_log_event_prefixes() {
        let event = LogEvent::new(Severity::Warning, "slow connection");
        assert_eq!(event.line, "WARNING: slow connection");
        assert_eq!(event.severity(), Some(Severity::Warning));
        assert!(!event.is_error());
        assert!(LogEvent::new(Severity::Error, "x").is_error());
    }

    #[test]
    fn test_request_builder() {
        let request = JobRequest::new("abc123", "144p").with_subtitles(true);
        assert_eq!(request.target_identifier, "abc123");
        assert!(request.include_subtitles);
    }
}
