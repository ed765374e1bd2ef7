// Failure diagnostics - turns raw engine failures into a short hint
//
// Used when a job fails so the final ERROR line tells the user what
// most likely went wrong (403, throttling, geo block, ...).

/// Known reasons a remote site refuses a download
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReason {
    /// HTTP 403 Forbidden - general access denied
    Http403Forbidden,

    /// Rate limiting (429 or similar)
    RateLimited,

    /// Bot detection triggered
    BotDetection,

    /// Age-restricted content requiring login
    AgeRestricted,

    /// Geographic restriction
    GeoBlocked,

    /// Private video requiring authorization
    PrivateVideo,

    /// Video deleted or unavailable
    VideoUnavailable,

    /// DRM-protected content
    DrmProtected,

    /// Network timeout (soft IP block)
    NetworkTimeout,
}

impl BlockingReason {
    /// Retrying later or from another network might help
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http403Forbidden | Self::RateLimited | Self::BotDetection | Self::NetworkTimeout
        )
    }

    /// Human-readable description
    pub fn description(&self) -> &'static str {
        match self {
            Self::Http403Forbidden => "Access denied (HTTP 403)",
            Self::RateLimited => "Rate limited by the remote site",
            Self::BotDetection => "Bot detection triggered",
            Self::AgeRestricted => "Age-restricted content",
            Self::GeoBlocked => "Geographic restriction",
            Self::PrivateVideo => "Private video",
            Self::VideoUnavailable => "Video unavailable",
            Self::DrmProtected => "DRM-protected content",
            Self::NetworkTimeout => "Network timeout (possible IP throttling)",
        }
    }
}

/// Analyze error message and return blocking reason
pub fn diagnose_error(error: &str) -> Option<BlockingReason> {
    let lower = error.to_lowercase();

    // Check patterns in order of specificity

    if lower.contains("drm") || lower.contains("widevine") || lower.contains("encrypted media") {
        return Some(BlockingReason::DrmProtected);
    }

    if lower.contains("age-restricted") || lower.contains("sign in to confirm your age") {
        return Some(BlockingReason::AgeRestricted);
    }

    if lower.contains("private video") || lower.contains("video is private") {
        return Some(BlockingReason::PrivateVideo);
    }

    if lower.contains("video unavailable")
        || lower.contains("video has been removed")
        || lower.contains("video is unavailable")
    {
        return Some(BlockingReason::VideoUnavailable);
    }

    if lower.contains("not available in your country") || lower.contains("blocked in your country") {
        return Some(BlockingReason::GeoBlocked);
    }

    if lower.contains("429") || lower.contains("rate limit") || lower.contains("too many requests") {
        return Some(BlockingReason::RateLimited);
    }

    if lower.contains("captcha") || lower.contains("unusual traffic") || lower.contains("confirm you're not a bot") {
        return Some(BlockingReason::BotDetection);
    }

    if lower.contains("403") || lower.contains("forbidden") {
        return Some(BlockingReason::Http403Forbidden);
    }

    if lower.contains("timeout") || lower.contains("timed out") || lower.contains("network unreachable") {
        return Some(BlockingReason::NetworkTimeout);
    }

    None
}

/// Append the diagnosed reason to a failure message, if one is recognised
pub fn annotate_failure(message: &str) -> String {
    match diagnose_error(message) {
        Some(reason) => format!("{} [{}]", message, reason.description()),
        None => message.to_string(),
    }
}
