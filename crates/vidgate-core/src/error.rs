//! Error types for Vidgate Core

use std::time::Duration;
use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug)]
pub enum Error {
    // Resolution errors
    #[error("Host not allowed for resolution: {0}")]
    DisallowedHost(String),

    #[error("Invalid Streamtape URL: {0}")]
    InvalidSourceUrl(String),

    #[error("Resolution timed out after {0:?}")]
    ResolutionTimeout(Duration),

    #[error("Resolution network error: {0}")]
    ResolutionNetwork(String),

    #[error("No direct media link found in page")]
    ResolutionParseFailure,

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Playback errors
    #[error("Autoplay blocked, user gesture required")]
    AutoplayBlocked,

    #[error("Media element error: {0}")]
    MediaElement(String),

    #[error("Fatal HLS error: {0}")]
    HlsFatal(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Quality level {0} does not exist")]
    InvalidQualityLevel(usize),

    #[error("Quality selection is only available for HLS sources")]
    QualityUnavailable,

    #[error("Invalid playback phase transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("No media source attached")]
    NotAttached,

    // Persistence errors
    #[error("Preference store error: {0}")]
    Preferences(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns true if this error is recoverable without tearing down the
    /// mounted surface
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::ResolutionTimeout(_)
                | Error::ResolutionNetwork(_)
                | Error::ResolutionParseFailure
                | Error::AutoplayBlocked
                | Error::InvalidQualityLevel(_)
                | Error::QualityUnavailable
                | Error::Network(_)
        )
    }

    /// Returns true for the resolution outcomes that trigger the embed fallback
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            Error::ResolutionTimeout(_) | Error::ResolutionNetwork(_) | Error::ResolutionParseFailure
        )
    }

    /// Returns the error code reported to hosting pages
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::DisallowedHost(_) => "DISALLOWED_HOST",
            Error::InvalidSourceUrl(_) => "INVALID_SOURCE_URL",
            Error::ResolutionTimeout(_) => "RESOLUTION_TIMEOUT",
            Error::ResolutionNetwork(_) => "RESOLUTION_NETWORK",
            Error::ResolutionParseFailure => "RESOLUTION_PARSE",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::AutoplayBlocked => "AUTOPLAY_BLOCKED",
            Error::MediaElement(_) => "MEDIA_ELEMENT",
            Error::HlsFatal(_) => "HLS_FATAL",
            Error::UnsupportedFormat(_) => "UNSUPPORTED_FORMAT",
            Error::InvalidQualityLevel(_) => "INVALID_QUALITY",
            Error::QualityUnavailable => "QUALITY_UNAVAILABLE",
            Error::InvalidStateTransition { .. } => "INVALID_STATE",
            Error::NotAttached => "NOT_ATTACHED",
            Error::Preferences(_) => "PREFERENCES",
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Json(_) => "JSON",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failures_are_recoverable() {
        let errors = [
            Error::ResolutionTimeout(Duration::from_secs(12)),
            Error::ResolutionNetwork("503".into()),
            Error::ResolutionParseFailure,
        ];
        for err in errors {
            assert!(err.is_resolution_failure());
            assert!(err.is_recoverable());
        }
    }

    #[test]
    fn test_disallowed_host_is_not_a_fallback_trigger() {
        let err = Error::DisallowedHost("evil.example".into());
        assert!(!err.is_resolution_failure());
        assert_eq!(err.error_code(), "DISALLOWED_HOST");
    }

    #[test]
    fn test_fatal_playback_errors() {
        assert!(!Error::HlsFatal("manifestLoadError".into()).is_recoverable());
        assert!(!Error::MediaElement("decode".into()).is_recoverable());
    }
}
