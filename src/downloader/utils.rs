// Helper functions for engine implementations

use std::path::{Path, PathBuf};

const YTDLP_BINARY: &str = "yt-dlp";

// Install locations that are not always on PATH (GUI launches, cron)
const WELL_KNOWN_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

/// Locate the yt-dlp executable.
///
/// An explicit override wins if it exists. Otherwise PATH is searched,
/// then the usual package-manager directories.
pub fn find_ytdlp(override_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!(path = %path.display(), "configured yt-dlp path does not exist, searching");
    }

    if let Ok(path) = which::which(YTDLP_BINARY) {
        return Some(path);
    }

    WELL_KNOWN_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(YTDLP_BINARY))
        .find(|candidate| candidate.is_file())
}
