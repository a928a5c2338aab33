//! Core types for Vidgate

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a player instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Media references
// =============================================================================

/// Coarse kind of a classified media reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Hls,
    Mp4,
    Youtube,
    Facebook,
    Streamtape,
    Rumble,
    Odysee,
    Generic,
    Unknown,
}

impl MediaKind {
    /// Kinds decoded by the native playback engine
    pub fn is_native(&self) -> bool {
        matches!(self, MediaKind::Hls | MediaKind::Mp4)
    }

    /// Kinds rendered through a vendor embed
    pub fn is_embed(&self) -> bool {
        matches!(
            self,
            MediaKind::Youtube | MediaKind::Facebook | MediaKind::Rumble | MediaKind::Odysee
        )
    }

    /// Kinds that cannot be played at all
    pub fn is_playable(&self) -> bool {
        !matches!(self, MediaKind::Generic | MediaKind::Unknown)
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MediaKind::Hls => "hls",
            MediaKind::Mp4 => "mp4",
            MediaKind::Youtube => "youtube",
            MediaKind::Facebook => "facebook",
            MediaKind::Streamtape => "streamtape",
            MediaKind::Rumble => "rumble",
            MediaKind::Odysee => "odysee",
            MediaKind::Generic => "generic",
            MediaKind::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Container of a progressive (non-HLS) file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Mp4,
    M4v,
    Mov,
    WebM,
    Ogg,
}

impl Container {
    /// Map a lowercase file extension to a container
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "mp4" => Some(Container::Mp4),
            "m4v" => Some(Container::M4v),
            "mov" => Some(Container::Mov),
            "webm" => Some(Container::WebM),
            "ogg" | "ogv" => Some(Container::Ogg),
            _ => None,
        }
    }
}

/// File-sharing host whose link was rewritten into a direct download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShareHost {
    GoogleDrive,
    Dropbox,
}

/// Tagged classification result with the data each kind needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaSource {
    Hls {
        via: Option<ShareHost>,
    },
    File {
        container: Container,
        via: Option<ShareHost>,
    },
    Youtube {
        video_id: String,
    },
    Facebook {
        canonical_url: String,
    },
    Streamtape {
        id: String,
    },
    Rumble {
        id: String,
    },
    Odysee {
        path: String,
    },
    Generic,
    #[default]
    Unknown,
}

impl MediaSource {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaSource::Hls { .. } => MediaKind::Hls,
            MediaSource::File { .. } => MediaKind::Mp4,
            MediaSource::Youtube { .. } => MediaKind::Youtube,
            MediaSource::Facebook { .. } => MediaKind::Facebook,
            MediaSource::Streamtape { .. } => MediaKind::Streamtape,
            MediaSource::Rumble { .. } => MediaKind::Rumble,
            MediaSource::Odysee { .. } => MediaKind::Odysee,
            MediaSource::Generic => MediaKind::Generic,
            MediaSource::Unknown => MediaKind::Unknown,
        }
    }
}

/// Classified, typed representation of a raw video link.
///
/// Immutable once built; a new reference is derived for every raw URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaReference {
    raw_url: String,
    kind: MediaKind,
    playable_url: String,
    #[serde(default)]
    source: MediaSource,
}

impl MediaReference {
    pub fn new(raw_url: impl Into<String>, playable_url: impl Into<String>, source: MediaSource) -> Self {
        Self {
            raw_url: raw_url.into(),
            kind: source.kind(),
            playable_url: playable_url.into(),
            source,
        }
    }

    /// The untrusted input string this reference was derived from
    pub fn raw_url(&self) -> &str {
        &self.raw_url
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn playable_url(&self) -> &str {
        &self.playable_url
    }

    pub fn source(&self) -> &MediaSource {
        &self.source
    }

    /// Iframe embed used when Streamtape resolution fails
    pub fn streamtape_embed_url(&self) -> Option<String> {
        match &self.source {
            MediaSource::Streamtape { id } => Some(format!("https://streamtape.com/e/{}/", id)),
            _ => None,
        }
    }
}

// =============================================================================
// Playback state
// =============================================================================

/// Primary playback phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackPhase {
    /// Nothing mounted yet
    Idle,
    /// Preferences applied, backend being attached
    Initializing,
    /// Waiting for metadata / manifest
    Loading,
    Playing,
    Paused,
    /// Reported when the buffering overlay is active during playback
    Buffering,
    Ended,
    Error,
}

impl PlaybackPhase {
    /// Check if transition to target phase is valid
    pub fn can_transition_to(&self, target: PlaybackPhase) -> bool {
        use PlaybackPhase::*;
        if target == Error {
            return *self != Idle;
        }
        matches!(
            (self, target),
            // From Idle
            (Idle, Initializing) |
            // From Initializing
            (Initializing, Loading) |
            // From Loading
            (Loading, Playing) | (Loading, Paused) | (Loading, Buffering) |
            // From Playing
            (Playing, Paused) | (Playing, Buffering) | (Playing, Ended) |
            // From Paused
            (Paused, Playing) | (Paused, Buffering) | (Paused, Ended) |
            // From Buffering
            (Buffering, Playing) | (Buffering, Paused) | (Buffering, Ended) |
            // From Ended
            (Ended, Playing) | (Ended, Paused) |
            // From Error (retry)
            (Error, Initializing)
        )
    }

    /// Phases where the control overlay must stay visible
    pub fn pins_controls(&self) -> bool {
        !matches!(self, PlaybackPhase::Playing | PlaybackPhase::Buffering)
    }
}

impl std::fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackPhase::Idle => write!(f, "idle"),
            PlaybackPhase::Initializing => write!(f, "initializing"),
            PlaybackPhase::Loading => write!(f, "loading"),
            PlaybackPhase::Playing => write!(f, "playing"),
            PlaybackPhase::Paused => write!(f, "paused"),
            PlaybackPhase::Buffering => write!(f, "buffering"),
            PlaybackPhase::Ended => write!(f, "ended"),
            PlaybackPhase::Error => write!(f, "error"),
        }
    }
}

/// One quality rendition enumerated from an HLS manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualityLevel {
    pub index: usize,
    pub height: Option<u32>,
    pub bitrate: Option<u64>,
}

impl QualityLevel {
    pub fn new(index: usize, height: Option<u32>) -> Self {
        Self {
            index,
            height,
            bitrate: None,
        }
    }

    /// Human-readable label, e.g. "720p"
    pub fn label(&self) -> String {
        match self.height {
            Some(h) => format!("{}p", h),
            None => format!("Level {}", self.index + 1),
        }
    }
}

/// Caller-visible quality selection: `auto` or a manifest level index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum QualityChoice {
    #[default]
    Auto,
    Level(usize),
}

impl QualityChoice {
    /// Decoder level, `None` meaning automatic selection (hls.js level -1)
    pub fn as_level(&self) -> Option<usize> {
        match self {
            QualityChoice::Auto => None,
            QualityChoice::Level(i) => Some(*i),
        }
    }
}

impl Serialize for QualityChoice {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            QualityChoice::Auto => serializer.serialize_str("auto"),
            QualityChoice::Level(i) => serializer.serialize_u64(*i as u64),
        }
    }
}

impl<'de> Deserialize<'de> for QualityChoice {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Index(usize),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Index(i) => Ok(QualityChoice::Level(i)),
            Raw::Text(s) if s.eq_ignore_ascii_case("auto") => Ok(QualityChoice::Auto),
            Raw::Text(s) => s
                .parse::<usize>()
                .map(QualityChoice::Level)
                .map_err(|_| serde::de::Error::custom(format!("invalid quality choice '{}'", s))),
        }
    }
}

impl std::fmt::Display for QualityChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityChoice::Auto => write!(f, "auto"),
            QualityChoice::Level(i) => write!(f, "{}", i),
        }
    }
}

/// Observable state of the mounted engine or adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    /// Content duration in seconds (0 while unknown)
    pub duration: f64,
    pub current_time: f64,
    /// Buffered percentage of the duration (0-100)
    pub buffered_pct: f64,
    pub volume: f64,
    pub muted: bool,
    pub playback_rate: f64,
    pub quality_level: QualityChoice,
    pub playing: bool,
    pub manual_play_needed: bool,
    pub fullscreen: bool,
    pub phase: PlaybackPhase,
    /// Buffering overlay, orthogonal to the primary phase
    pub buffering: bool,
    pub controls_visible: bool,
    pub error_message: Option<String>,
}

impl PlaybackState {
    /// Phase as presented to the UI, folding the buffering overlay in
    pub fn effective_phase(&self) -> PlaybackPhase {
        if self.phase != PlaybackPhase::Error && self.buffering && !matches!(self.phase, PlaybackPhase::Ended) {
            PlaybackPhase::Buffering
        } else {
            self.phase
        }
    }
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            duration: 0.0,
            current_time: 0.0,
            buffered_pct: 0.0,
            volume: 1.0,
            muted: false,
            playback_rate: 1.0,
            quality_level: QualityChoice::Auto,
            playing: false,
            manual_play_needed: false,
            fullscreen: false,
            phase: PlaybackPhase::Idle,
            buffering: false,
            controls_visible: true,
            error_message: None,
        }
    }
}

/// Bounds shared by the engine and the preference store
pub const MIN_PLAYBACK_RATE: f64 = 0.25;
pub const MAX_PLAYBACK_RATE: f64 = 3.0;

pub fn clamp_volume(volume: f64) -> f64 {
    if volume.is_nan() {
        return 1.0;
    }
    volume.clamp(0.0, 1.0)
}

pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        return 1.0;
    }
    rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

// =============================================================================
// Configuration
// =============================================================================

/// Player configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Time allowed for a requested autoplay to start (milliseconds)
    pub autoplay_watchdog_ms: u64,
    /// Inactivity before the control overlay hides while playing (milliseconds)
    pub controls_hide_ms: u64,
    /// Arrow-key seek step in seconds
    pub seek_step: f64,
    /// Arrow-key volume step (fraction of full volume)
    pub volume_step: f64,
    /// Rate step for the `<`/`>` keys
    pub rate_step: f64,
    /// Abort for a Streamtape resolution request (milliseconds)
    pub resolver_timeout_ms: u64,
    /// Resolver endpoint used by the HTTP resolver client
    pub resolver_endpoint: String,
    /// Lifetime of a handoff entry (seconds)
    pub handoff_ttl_secs: u64,
    /// User agent used for page and manifest fetches
    pub user_agent: String,
}

impl PlayerConfig {
    pub fn autoplay_watchdog(&self) -> Duration {
        Duration::from_millis(self.autoplay_watchdog_ms)
    }

    pub fn controls_hide_after(&self) -> Duration {
        Duration::from_millis(self.controls_hide_ms)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    pub fn handoff_ttl(&self) -> Duration {
        Duration::from_secs(self.handoff_ttl_secs)
    }

    /// Reject configurations the engine cannot run with
    pub fn validate(&self) -> crate::Result<()> {
        if self.autoplay_watchdog_ms == 0 {
            return Err(crate::Error::InvalidConfig("autoplay_watchdog_ms must be > 0".into()));
        }
        if self.resolver_timeout_ms == 0 {
            return Err(crate::Error::InvalidConfig("resolver_timeout_ms must be > 0".into()));
        }
        if !(self.seek_step > 0.0 && self.volume_step > 0.0 && self.rate_step > 0.0) {
            return Err(crate::Error::InvalidConfig("step sizes must be positive".into()));
        }
        Ok(())
    }
}

/// Desktop Chrome user agent; Streamtape serves a stripped page to unknown agents
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            autoplay_watchdog_ms: 8_000,
            controls_hide_ms: 3_000,
            seek_step: 5.0,
            volume_step: 0.05,
            rate_step: 0.25,
            resolver_timeout_ms: 12_000,
            resolver_endpoint: "http://127.0.0.1:8787/resolve-streamtape".to_string(),
            handoff_ttl_secs: 30 * 60,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }
}
