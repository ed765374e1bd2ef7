// ProfileRegistry - static download presets
//
// Profiles are plain data. Lookup is exact and case-sensitive; any
// unknown name silently resolves to the default profile.

use lazy_static::lazy_static;

use super::models::{DownloadProfile, IgnoreErrorsMode, PostProcessorStep};

/// Name of the profile used when a requested name is unknown
pub const DEFAULT_PROFILE: &str = "480p";

const RETRIES: u32 = 10;
const EXTRACT_FLAT: &str = "discard_in_playlist";

fn preset(name: &str, format_rule: &str) -> DownloadProfile {
    DownloadProfile {
        name: name.to_string(),
        format_rule: format_rule.to_string(),
        retry_count: RETRIES,
        ignore_errors: IgnoreErrorsMode::SkipFailedDownloadOnly,
        postprocessing_steps: vec![PostProcessorStep::concat_playlist()],
        extract_flat: EXTRACT_FLAT.to_string(),
    }
}

lazy_static! {
    static ref DEFAULT: DownloadProfile =
        preset(DEFAULT_PROFILE, "(mp4)[height<=480]+ba/(mp4)[height<=480] / wv*+ba/w");

    // Registry order is presentation order
    static ref PROFILES: Vec<DownloadProfile> = vec![
        preset("144p", "(mp4)[height<=144]+ba/(mp4)[height<=144] / wv*+wa/w"),
        DEFAULT.clone(),
        preset("audio-only", "(mp4)wa"),
    ];
}

/// Lookup table of download profiles
pub struct ProfileRegistry;

impl ProfileRegistry {
    /// Profile matching `name` exactly, else the default profile
    pub fn resolve(name: &str) -> &'static DownloadProfile {
        match PROFILES.iter().find(|p| p.name == name) {
            Some(profile) => profile,
            None => {
                tracing::debug!(requested = name, fallback = DEFAULT_PROFILE, "unknown profile, using default");
                Self::default_profile()
            }
        }
    }

    pub fn default_profile() -> &'static DownloadProfile {
        &DEFAULT
    }

    /// All profile names in stable registry order
    pub fn enumerate_names() -> Vec<&'static str> {
        PROFILES.iter().map(|p| p.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumerates_in_registry_order() {
        assert_eq!(ProfileRegistry::enumerate_names(), vec!["144p", "480p", "audio-only"]);
        // Stable across calls
        assert_eq!(ProfileRegistry::enumerate_names(), ProfileRegistry::enumerate_names());
    }

    #[test]
    fn test_resolves_known_profiles() {
        for name in ProfileRegistry::enumerate_names() {
            let profile = ProfileRegistry::resolve(name);
            assert_eq!(profile.name, name);
            assert_eq!(profile.retry_count, 10);
            assert_eq!(profile.ignore_errors, IgnoreErrorsMode::SkipFailedDownloadOnly);
            assert_eq!(profile.postprocessing_steps, vec![PostProcessorStep::concat_playlist()]);
            assert_eq!(profile.extract_flat, "discard_in_playlist");
        }
    }

    #[test]
    fn test_format_rules_match_presets() {
        assert_eq!(
            ProfileRegistry::resolve("144p").format_rule,
            "(mp4)[height<=144]+ba/(mp4)[height<=144] / wv*+wa/w"
        );
        assert_eq!(
            ProfileRegistry::resolve("480p").format_rule,
            "(mp4)[height<=480]+ba/(mp4)[height<=480] / wv*+ba/w"
        );
        assert_eq!(ProfileRegistry::resolve("audio-only").format_rule, "(mp4)wa");
    }

    #[test]
    fn test_unknown_names_fall_back_to_default() {
        for name in ["", "unknown-name", "720p", "480P", " 480p", "AUDIO-ONLY"] {
            assert_eq!(ProfileRegistry::resolve(name), ProfileRegistry::default_profile());
        }
        assert_eq!(ProfileRegistry::default_profile().name, DEFAULT_PROFILE);
    }

    #[test]
    fn test_default_is_registered() {
        assert!(ProfileRegistry::enumerate_names().contains(&DEFAULT_PROFILE));
    }
}
