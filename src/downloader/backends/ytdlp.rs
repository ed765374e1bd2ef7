use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;

use crate::downloader::errors::DownloadError;
use crate::downloader::models::{EngineOptions, IgnoreErrorsMode, Severity};
use crate::downloader::traits::{EngineLogger, RetrievalEngine};
use crate::downloader::utils::find_ytdlp;

lazy_static! {
    static ref SEVERITY_PREFIX: Regex = Regex::new(r"^(ERROR|WARNING):\s*").unwrap();
}

/// yt-dlp driven through its command line
pub struct YtDlpEngine {
    binary: PathBuf,
    output_dir: PathBuf,
    proxy: Option<String>,
}

impl YtDlpEngine {
    pub fn new(binary: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            output_dir: output_dir.into(),
            proxy: None,
        }
    }

    /// Find the binary on this machine, honouring an explicit override
    pub fn locate(override_path: Option<&Path>, output_dir: impl Into<PathBuf>) -> Result<Self, DownloadError> {
        let binary = find_ytdlp(override_path)
            .ok_or_else(|| DownloadError::ToolNotFound("yt-dlp is not installed or not on PATH".to_string()))?;
        tracing::debug!(binary = %binary.display(), "using yt-dlp");
        Ok(Self::new(binary, output_dir))
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy.filter(|p| !p.trim().is_empty());
        self
    }
}

#[async_trait]
impl RetrievalEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn download(
        &self,
        target: &str,
        options: &EngineOptions,
        logger: &dyn EngineLogger,
        cancel: CancellationToken,
    ) -> Result<(), DownloadError> {
        let args = build_args(target, options, &self.output_dir, self.proxy.as_deref());
        tracing::debug!(binary = %self.binary.display(), ?args, "spawning yt-dlp");

        let mut command = Command::new(&self.binary);
        command.args(&args);
        stream_process(command, logger, cancel).await
    }
}

/// Map engine options onto yt-dlp flags
pub fn build_args(target: &str, options: &EngineOptions, output_dir: &Path, proxy: Option<&str>) -> Vec<String> {
    let mut args = vec![
        "-f".to_string(),
        options.format.clone(),
        "--retries".to_string(),
        options.retries.to_string(),
        "--fragment-retries".to_string(),
        options.fragment_retries.to_string(),
    ];

    args.push(
        match options.ignoreerrors {
            IgnoreErrorsMode::SkipFailedDownloadOnly => "--no-abort-on-error",
            IgnoreErrorsMode::None => "--abort-on-error",
        }
        .to_string(),
    );

    // "discard_in_playlist" is yt-dlp's own default
    if options.extract_flat != "discard_in_playlist" {
        tracing::debug!(extract_flat = %options.extract_flat, "extract_flat has no CLI equivalent, ignored");
    }

    let concat = if options.postprocessors.iter().any(|p| p.is_playlist_concat()) {
        "multi_video"
    } else {
        "never"
    };
    args.push("--concat-playlist".to_string());
    args.push(concat.to_string());

    if options.writeautomaticsub == Some(true) {
        args.push("--write-auto-subs".to_string());
    }
    if let Some(format) = &options.subtitlesformat {
        args.push("--sub-format".to_string());
        args.push(format.clone());
    }

    if let Some(proxy) = proxy {
        args.push("--proxy".to_string());
        args.push(proxy.to_string());
    }

    args.push("--newline".to_string());
    args.push("-P".to_string());
    args.push(output_dir.to_string_lossy().into_owned());
    args.push("--".to_string());
    args.push(target.to_string());
    args
}

/// Split a raw output line into its severity and message
pub fn classify_line(line: &str) -> (Severity, &str) {
    let line = line.trim_end();
    match SEVERITY_PREFIX.captures(line) {
        Some(caps) => {
            let severity = if &caps[1] == "ERROR" {
                Severity::Error
            } else {
                Severity::Warning
            };
            let end = caps.get(0).map_or(0, |m| m.end());
            (severity, &line[end..])
        }
        None => (Severity::Debug, line),
    }
}

/// Run a prepared command, forwarding each output line to `logger`.
///
/// Both pipes are read until EOF before the exit status is taken. A
/// non-zero exit is classified from the last `ERROR:` message.
pub async fn stream_process(
    mut command: Command,
    logger: &dyn EngineLogger,
    cancel: CancellationToken,
) -> Result<(), DownloadError> {
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| DownloadError::ToolNotFound(format!("Failed to start yt-dlp: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stdout".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| DownloadError::ExecutionError("Failed to capture stderr".to_string()))?;

    let mut out_lines = BufReader::new(stdout).split(b'\n');
    let mut err_lines = BufReader::new(stderr).split(b'\n');
    let mut out_open = true;
    let mut err_open = true;
    let mut last_error: Option<String> = None;

    // Output is not guaranteed to be UTF-8 (titles, local-encoding paths)
    let mut forward = |raw: Vec<u8>| {
        let line = String::from_utf8_lossy(&raw);
        let (severity, message) = classify_line(&line);
        match severity {
            Severity::Debug => logger.debug(message),
            Severity::Warning => logger.warning(message),
            Severity::Error => {
                logger.error(message);
                last_error = Some(message.to_string());
            }
        }
    };

    let status = loop {
        tokio::select! {
            segment = out_lines.next_segment(), if out_open => match segment {
                Ok(Some(raw)) => forward(raw),
                Ok(None) => out_open = false,
                Err(e) => return Err(abandon(&mut child, "stdout", e).await),
            },
            segment = err_lines.next_segment(), if err_open => match segment {
                Ok(Some(raw)) => forward(raw),
                Ok(None) => err_open = false,
                Err(e) => return Err(abandon(&mut child, "stderr", e).await),
            },
            status = child.wait(), if !out_open && !err_open => {
                break status.map_err(|e| DownloadError::ExecutionError(format!("Process error: {}", e)))?;
            }
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                tracing::info!("yt-dlp killed on cancellation");
                return Err(DownloadError::Cancelled);
            }
        }
    };

    if status.success() {
        return Ok(());
    }

    tracing::debug!(%status, "yt-dlp exited unsuccessfully");
    Err(match last_error {
        Some(message) => DownloadError::from(message),
        None => DownloadError::ExecutionError(format!("yt-dlp exited with {}", status)),
    })
}

// An unreadable pipe would eventually fill up and stall the child, so kill it
async fn abandon(child: &mut Child, stream: &str, error: io::Error) -> DownloadError {
    let _ = child.kill().await;
    tracing::warn!(stream, "failed to read yt-dlp output, killed: {}", error);
    DownloadError::ExecutionError(format!("Failed to read yt-dlp {}: {}", stream, error))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use crate::downloader::models::PostProcessorStep;
    use crate::downloader::profiles::ProfileRegistry;

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(Severity, String)>>,
    }

    impl RecordingLogger {
        fn push(&self, severity: Severity, msg: &str) {
            self.lines.lock().unwrap().push((severity, msg.to_string()));
        }

        fn lines(&self) -> Vec<(Severity, String)> {
            self.lines.lock().unwrap().clone()
        }
    }

    impl EngineLogger for RecordingLogger {
        fn debug(&self, msg: &str) {
            self.push(Severity::Debug, msg);
        }
        fn warning(&self, msg: &str) {
            self.push(Severity::Warning, msg);
        }
        fn error(&self, msg: &str) {
            self.push(Severity::Error, msg);
        }
    }

    fn shell(script: &str) -> Command {
        let mut command = Command::new("sh");
        command.arg("-c").arg(script);
        command
    }

    fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn test_profile_maps_to_flags() {
        let options = EngineOptions::from_profile(ProfileRegistry::resolve("144p"));
        let args = build_args("abc123", &options, Path::new("/tmp/out"), None);

        assert_eq!(flag_value(&args, "-f"), Some("(mp4)[height<=144]+ba/(mp4)[height<=144] / wv*+wa/w"));
        assert_eq!(flag_value(&args, "--retries"), Some("10"));
        assert_eq!(flag_value(&args, "--fragment-retries"), Some("10"));
        assert_eq!(flag_value(&args, "--concat-playlist"), Some("multi_video"));
        assert_eq!(flag_value(&args, "-P"), Some("/tmp/out"));
        assert!(args.contains(&"--no-abort-on-error".to_string()));
        assert!(args.contains(&"--newline".to_string()));
        assert!(!args.contains(&"--write-auto-subs".to_string()));
        assert!(!args.contains(&"--proxy".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("abc123"));
    }

    #[test]
    fn test_subtitles_and_proxy_flags() {
        let options = EngineOptions::from_profile(ProfileRegistry::default_profile()).with_subtitle_overlay();
        let args = build_args("-dashed-id", &options, Path::new("."), Some("socks5h://127.0.0.1:1080"));

        assert!(args.contains(&"--write-auto-subs".to_string()));
        assert_eq!(flag_value(&args, "--sub-format"), Some("srt"));
        assert_eq!(flag_value(&args, "--proxy"), Some("socks5h://127.0.0.1:1080"));
        // Target cannot be mistaken for a flag
        assert_eq!(&args[args.len() - 2..], ["--", "-dashed-id"]);
    }

    #[test]
    fn test_strict_options_abort_and_never_concat() {
        let mut options = EngineOptions::from_profile(ProfileRegistry::default_profile());
        options.ignoreerrors = IgnoreErrorsMode::None;
        options.postprocessors = vec![PostProcessorStep {
            key: "FFmpegMetadata".to_string(),
            only_multi_video: false,
            when: "post_process".to_string(),
        }];
        let args = build_args("abc123", &options, Path::new("."), None);

        assert!(args.contains(&"--abort-on-error".to_string()));
        assert_eq!(flag_value(&args, "--concat-playlist"), Some("never"));
    }

    #[test]
    fn test_classify_line_strips_prefix() {
        assert_eq!(
            classify_line("ERROR: [youtube] abc123: Video unavailable"),
            (Severity::Error, "[youtube] abc123: Video unavailable")
        );
        assert_eq!(
            classify_line("WARNING:  falling back\r"),
            (Severity::Warning, "falling back")
        );
        assert_eq!(
            classify_line("[download]  42.0% of 10.00MiB"),
            (Severity::Debug, "[download]  42.0% of 10.00MiB")
        );
        // Only a leading prefix counts
        assert_eq!(classify_line("note: ERROR: x").0, Severity::Debug);
    }

    #[tokio::test]
    async fn test_stream_process_routes_lines() {
        let logger = RecordingLogger::default();
        let script = "echo '[youtube] abc: Downloading webpage'; echo 'WARNING: slow'; echo '[download] 100%'";

        stream_process(shell(script), &logger, CancellationToken::new()).await.unwrap();

        assert_eq!(
            logger.lines(),
            vec![
                (Severity::Debug, "[youtube] abc: Downloading webpage".to_string()),
                (Severity::Warning, "slow".to_string()),
                (Severity::Debug, "[download] 100%".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_classified() {
        let logger = RecordingLogger::default();
        let script = "echo 'ERROR: unable to download video data: HTTP Error 403: Forbidden' >&2; exit 1";

        let err = stream_process(shell(script), &logger, CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            DownloadError::Blocked("unable to download video data: HTTP Error 403: Forbidden".to_string())
        );
        assert!(!err.to_string().contains("ERROR:"));
        assert_eq!(logger.lines().len(), 1);
        assert_eq!(logger.lines()[0].0, Severity::Error);
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stall_reading() {
        let logger = RecordingLogger::default();
        // 3000 lines of 100 bytes, well past the pipe buffer
        let script = format!(
            "printf 'before\\n\\377bad\\nafter\\n'; yes '{}' | head -n 3000",
            "x".repeat(99)
        );

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            stream_process(shell(&script), &logger, CancellationToken::new()),
        )
        .await
        .expect("reading stalled after a non UTF-8 line");

        assert_eq!(result, Ok(()));
        let lines = logger.lines();
        assert_eq!(lines.len(), 3003);
        assert_eq!(lines[0].1, "before");
        assert_eq!(lines[1].1, "\u{FFFD}bad");
        assert_eq!(lines[2].1, "after");
        assert_eq!(lines[3002].1, "x".repeat(99));
    }

    #[tokio::test]
    async fn test_silent_failure_reports_exit_status() {
        let logger = RecordingLogger::default();
        let err = stream_process(shell("exit 3"), &logger, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::ExecutionError(_)));
    }

    #[tokio::test]
    async fn test_cancel_kills_child() {
        let logger = RecordingLogger::default();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            stream_process(shell("sleep 30"), &logger, cancel),
        )
        .await
        .expect("child was not killed");

        assert_eq!(result, Err(DownloadError::Cancelled));
    }

    #[tokio::test]
    async fn test_missing_binary_is_tool_not_found() {
        let engine = YtDlpEngine::new("/nonexistent/yt-dlp", ".");
        let logger = RecordingLogger::default();
        let options = EngineOptions::from_profile(ProfileRegistry::default_profile());

        let err = engine
            .download("abc123", &options, &logger, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }
}
