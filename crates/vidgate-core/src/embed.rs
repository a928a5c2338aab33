//! Vendor embed adapters
//!
//! YouTube is driven through an injected IFrame-API binding. Facebook, Rumble,
//! Odysee and the Streamtape fallback only expose an iframe: those show a
//! poster until the user interacts, then mount the iframe and show a spinner
//! until its `load` event.

use crate::{
    surface::{PlaybackSurface, PlayerSignal},
    types::{clamp_rate, MediaKind, MediaReference, MediaSource, PlaybackPhase, PlaybackState},
};
use serde::Serialize;
use std::time::Instant;
use tracing::{debug, info, warn};

// =============================================================================
// YouTube
// =============================================================================

/// Binding to a YouTube IFrame player
pub trait YouTubePlayerApi: Send {
    fn play_video(&mut self);
    fn pause_video(&mut self);
    fn seek_to(&mut self, seconds: f64, allow_seek_ahead: bool);
    fn current_time(&self) -> f64;
    fn duration(&self) -> f64;
    fn available_playback_rates(&self) -> Vec<f64>;
    fn set_playback_rate(&mut self, rate: f64);
    fn mute(&mut self);
    fn un_mute(&mut self);
    fn is_muted(&self) -> bool;
    fn destroy(&mut self);
}

/// `onStateChange` codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YouTubeState {
    Unstarted,
    Ended,
    Playing,
    Paused,
    Buffering,
    Cued,
}

impl YouTubeState {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            -1 => Some(YouTubeState::Unstarted),
            0 => Some(YouTubeState::Ended),
            1 => Some(YouTubeState::Playing),
            2 => Some(YouTubeState::Paused),
            3 => Some(YouTubeState::Buffering),
            5 => Some(YouTubeState::Cued),
            _ => None,
        }
    }
}

/// User-facing message for an `onError` code
pub fn youtube_error_message(code: i32) -> String {
    match code {
        2 => "This video link is invalid.".to_string(),
        5 => "This video cannot be played in the HTML5 player.".to_string(),
        100 => "This video was removed or is private.".to_string(),
        101 | 150 => "The owner does not allow this video to be played here.".to_string(),
        other => format!("YouTube player error {}.", other),
    }
}

/// Adapter over a YouTube IFrame player
pub struct YouTubeAdapter<P: YouTubePlayerApi> {
    api: P,
    video_id: String,
    state: PlaybackState,
    ready: bool,
    ended_signalled: bool,
    destroyed: bool,
    signals: Vec<PlayerSignal>,
}

impl<P: YouTubePlayerApi> YouTubeAdapter<P> {
    pub fn new(api: P, video_id: impl Into<String>) -> Self {
        let state = PlaybackState {
            phase: PlaybackPhase::Initializing,
            ..PlaybackState::default()
        };
        Self {
            api,
            video_id: video_id.into(),
            state,
            ready: false,
            ended_signalled: false,
            destroyed: false,
            signals: Vec::new(),
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn api(&self) -> &P {
        &self.api
    }

    fn set_phase(&mut self, to: PlaybackPhase) {
        if self.state.phase != to && self.state.phase.can_transition_to(to) {
            self.state.phase = to;
        }
    }

    pub fn on_ready(&mut self) {
        self.ready = true;
        self.state.duration = self.api.duration().max(0.0);
        self.state.muted = self.api.is_muted();
        self.set_phase(PlaybackPhase::Loading);
        debug!(video_id = %self.video_id, "YouTube player ready");
    }

    pub fn on_state_change(&mut self, code: i32) {
        let Some(yt_state) = YouTubeState::from_code(code) else {
            debug!(code, "Unknown YouTube state");
            return;
        };
        self.state.current_time = self.api.current_time();

        match yt_state {
            YouTubeState::Playing => {
                self.state.playing = true;
                self.state.buffering = false;
                self.ended_signalled = false;
                self.set_phase(PlaybackPhase::Playing);
            }
            YouTubeState::Paused => {
                self.state.playing = false;
                self.state.buffering = false;
                self.set_phase(PlaybackPhase::Paused);
            }
            YouTubeState::Buffering => {
                self.state.buffering = true;
            }
            YouTubeState::Ended => {
                self.state.playing = false;
                self.state.buffering = false;
                self.set_phase(PlaybackPhase::Ended);
                if !self.ended_signalled {
                    self.ended_signalled = true;
                    self.signals.push(PlayerSignal::Ended);
                }
            }
            YouTubeState::Unstarted | YouTubeState::Cued => {}
        }
    }

    pub fn on_error(&mut self, code: i32) {
        let message = youtube_error_message(code);
        warn!(video_id = %self.video_id, code, "YouTube player error");
        self.state.playing = false;
        self.state.error_message = Some(message.clone());
        self.set_phase(PlaybackPhase::Error);
        self.signals.push(PlayerSignal::Error { message });
    }

    /// Pick the allowed rate nearest to `rate`
    fn snap_rate(&self, rate: f64) -> f64 {
        let rate = clamp_rate(rate);
        self.api
            .available_playback_rates()
            .into_iter()
            .min_by(|a, b| (a - rate).abs().total_cmp(&(b - rate).abs()))
            .unwrap_or(rate)
    }
}

impl<P: YouTubePlayerApi> PlaybackSurface for YouTubeAdapter<P> {
    fn state(&self) -> &PlaybackState {
        &self.state
    }

    fn toggle_play(&mut self, _now: Instant) {
        if !self.ready {
            return;
        }
        if self.state.playing {
            self.api.pause_video();
        } else {
            self.api.play_video();
        }
    }

    fn skip(&mut self, seconds: f64, _now: Instant) -> bool {
        if !self.ready {
            return false;
        }
        let duration = self.api.duration();
        let upper = if duration > 0.0 { duration } else { f64::INFINITY };
        let target = (self.api.current_time() + seconds).clamp(0.0, upper);
        self.api.seek_to(target, true);
        self.state.current_time = target;
        true
    }

    fn set_rate(&mut self, rate: f64) -> f64 {
        let snapped = self.snap_rate(rate);
        if self.ready {
            self.api.set_playback_rate(snapped);
        }
        self.state.playback_rate = snapped;
        snapped
    }

    fn toggle_mute(&mut self) -> Option<bool> {
        if !self.ready {
            return None;
        }
        let muted = !self.api.is_muted();
        if muted {
            self.api.mute();
        } else {
            self.api.un_mute();
        }
        self.state.muted = muted;
        Some(muted)
    }

    fn take_signals(&mut self) -> Vec<PlayerSignal> {
        std::mem::take(&mut self.signals)
    }

    fn teardown(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.api.destroy();
            debug!(video_id = %self.video_id, "YouTube player destroyed");
        }
    }
}

impl<P: YouTubePlayerApi> Drop for YouTubeAdapter<P> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Iframe embeds
// =============================================================================

/// Vendors rendered as a plain iframe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedProvider {
    Youtube,
    Facebook,
    Rumble,
    Odysee,
    Streamtape,
}

impl EmbedProvider {
    pub fn from_kind(kind: MediaKind) -> Option<Self> {
        match kind {
            MediaKind::Youtube => Some(EmbedProvider::Youtube),
            MediaKind::Facebook => Some(EmbedProvider::Facebook),
            MediaKind::Rumble => Some(EmbedProvider::Rumble),
            MediaKind::Odysee => Some(EmbedProvider::Odysee),
            MediaKind::Streamtape => Some(EmbedProvider::Streamtape),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EmbedProvider::Youtube => "YouTube",
            EmbedProvider::Facebook => "Facebook",
            EmbedProvider::Rumble => "Rumble",
            EmbedProvider::Odysee => "Odysee",
            EmbedProvider::Streamtape => "Streamtape",
        }
    }

    /// Permissions policy for the iframe `allow` attribute
    pub fn allow_policy(&self) -> &'static str {
        "autoplay; encrypted-media; fullscreen; picture-in-picture"
    }

    /// Cosmetic overlay covering the vendor logo
    pub fn branding_mask(&self) -> Option<BrandingMask> {
        match self {
            EmbedProvider::Streamtape => Some(BrandingMask {
                corner: Corner::TopRight,
                width_px: 140,
                height_px: 48,
            }),
            EmbedProvider::Rumble => Some(BrandingMask {
                corner: Corner::BottomRight,
                width_px: 96,
                height_px: 40,
            }),
            _ => None,
        }
    }
}

impl std::fmt::Display for EmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

/// Presentation-only overlay; never intercepts input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrandingMask {
    pub corner: Corner,
    pub width_px: u32,
    pub height_px: u32,
}

/// Everything a host needs to render the iframe
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IframeSpec {
    pub src: String,
    pub title: String,
    pub allow: &'static str,
    pub allow_fullscreen: bool,
    pub mask: Option<BrandingMask>,
}

/// Click-to-reveal lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IframePhase {
    Poster,
    Loading,
    Loaded,
    Failed,
}

/// Adapter for vendors without a scriptable API
pub struct IframeAdapter {
    provider: EmbedProvider,
    embed_url: String,
    poster: Option<String>,
    mask_enabled: bool,
    phase: IframePhase,
    state: PlaybackState,
    signals: Vec<PlayerSignal>,
}

impl IframeAdapter {
    pub fn new(provider: EmbedProvider, embed_url: impl Into<String>) -> Self {
        let state = PlaybackState {
            phase: PlaybackPhase::Initializing,
            ..PlaybackState::default()
        };
        Self {
            provider,
            embed_url: embed_url.into(),
            poster: None,
            mask_enabled: false,
            phase: IframePhase::Poster,
            state,
            signals: Vec::new(),
        }
    }

    /// Adapter for an embed-kind reference, or the Streamtape fallback embed
    pub fn for_reference(reference: &MediaReference) -> Option<Self> {
        let provider = EmbedProvider::from_kind(reference.kind())?;
        let url = match reference.source() {
            MediaSource::Streamtape { .. } => reference.streamtape_embed_url()?,
            _ => reference.playable_url().to_string(),
        };
        Some(Self::new(provider, url))
    }

    pub fn with_poster(mut self, poster: Option<String>) -> Self {
        self.poster = poster;
        self
    }

    pub fn with_branding_mask(mut self, enabled: bool) -> Self {
        self.mask_enabled = enabled;
        self
    }

    pub fn provider(&self) -> EmbedProvider {
        self.provider
    }

    pub fn embed_url(&self) -> &str {
        &self.embed_url
    }

    pub fn poster(&self) -> Option<&str> {
        self.poster.as_deref()
    }

    pub fn phase(&self) -> IframePhase {
        self.phase
    }

    pub fn shows_spinner(&self) -> bool {
        self.phase == IframePhase::Loading
    }

    /// User interaction on the poster mounts the iframe
    pub fn reveal(&mut self) -> Option<IframeSpec> {
        if self.phase == IframePhase::Poster {
            info!(provider = %self.provider, url = %self.embed_url, "Revealing embed");
            self.phase = IframePhase::Loading;
            self.state.phase = PlaybackPhase::Loading;
        }
        self.iframe()
    }

    /// Iframe to render, once revealed
    pub fn iframe(&self) -> Option<IframeSpec> {
        matches!(self.phase, IframePhase::Loading | IframePhase::Loaded).then(|| IframeSpec {
            src: self.embed_url.clone(),
            title: format!("{} video player", self.provider),
            allow: self.provider.allow_policy(),
            allow_fullscreen: true,
            mask: self
                .mask_enabled
                .then(|| self.provider.branding_mask())
                .flatten(),
        })
    }

    /// The iframe `load` event
    pub fn on_load(&mut self) {
        if self.phase == IframePhase::Loading {
            self.phase = IframePhase::Loaded;
            self.state.phase = PlaybackPhase::Playing;
            self.state.playing = true;
            debug!(provider = %self.provider, "Embed loaded");
        }
    }

    pub fn on_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(provider = %self.provider, error = %message, "Embed failed");
        self.phase = IframePhase::Failed;
        self.state.playing = false;
        self.state.error_message = Some(message.clone());
        self.state.phase = PlaybackPhase::Error;
        self.signals.push(PlayerSignal::Error { message });
    }
}

impl PlaybackSurface for IframeAdapter {
    fn state(&self) -> &PlaybackState {
        &self.state
    }

    /// Only the poster is interactive; the vendor owns playback afterwards
    fn toggle_play(&mut self, _now: Instant) {
        self.reveal();
    }

    fn skip(&mut self, _seconds: f64, _now: Instant) -> bool {
        false
    }

    fn set_rate(&mut self, _rate: f64) -> f64 {
        self.state.playback_rate
    }

    fn toggle_mute(&mut self) -> Option<bool> {
        None
    }

    fn take_signals(&mut self) -> Vec<PlayerSignal> {
        std::mem::take(&mut self.signals)
    }

    fn teardown(&mut self) {
        if self.phase != IframePhase::Poster {
            debug!(provider = %self.provider, "Embed removed");
        }
        self.phase = IframePhase::Poster;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct FakeYouTube {
        log: Arc<Mutex<Vec<String>>>,
        time: f64,
        duration: f64,
        muted: bool,
    }

    impl YouTubePlayerApi for FakeYouTube {
        fn play_video(&mut self) {
            self.log.lock().unwrap().push("play".into());
        }
        fn pause_video(&mut self) {
            self.log.lock().unwrap().push("pause".into());
        }
        fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
            self.time = seconds;
            self.log.lock().unwrap().push(format!("seek {}", seconds));
        }
        fn current_time(&self) -> f64 {
            self.time
        }
        fn duration(&self) -> f64 {
            self.duration
        }
        fn available_playback_rates(&self) -> Vec<f64> {
            vec![0.25, 0.5, 0.75, 1.0, 1.25, 1.5, 1.75, 2.0]
        }
        fn set_playback_rate(&mut self, rate: f64) {
            self.log.lock().unwrap().push(format!("rate {}", rate));
        }
        fn mute(&mut self) {
            self.muted = true;
            self.log.lock().unwrap().push("mute".into());
        }
        fn un_mute(&mut self) {
            self.muted = false;
            self.log.lock().unwrap().push("unmute".into());
        }
        fn is_muted(&self) -> bool {
            self.muted
        }
        fn destroy(&mut self) {
            self.log.lock().unwrap().push("destroy".into());
        }
    }

    fn ready_adapter() -> (YouTubeAdapter<FakeYouTube>, Arc<Mutex<Vec<String>>>) {
        let api = FakeYouTube {
            duration: 200.0,
            time: 10.0,
            ..FakeYouTube::default()
        };
        let log = Arc::clone(&api.log);
        let mut adapter = YouTubeAdapter::new(api, "dQw4w9WgXcQ");
        adapter.on_ready();
        (adapter, log)
    }

    #[test]
    fn test_youtube_state_mapping() {
        let (mut adapter, _) = ready_adapter();
        adapter.on_state_change(1);
        assert!(adapter.state().playing);
        assert_eq!(adapter.state().phase, PlaybackPhase::Playing);
        adapter.on_state_change(3);
        assert_eq!(adapter.state().effective_phase(), PlaybackPhase::Buffering);
        adapter.on_state_change(2);
        assert_eq!(adapter.state().phase, PlaybackPhase::Paused);
        adapter.on_state_change(0);
        adapter.on_state_change(0);
        assert_eq!(adapter.take_signals(), vec![PlayerSignal::Ended]);
    }

    #[test]
    fn test_youtube_errors() {
        let (mut adapter, _) = ready_adapter();
        adapter.on_error(150);
        assert_eq!(adapter.state().phase, PlaybackPhase::Error);
        assert_eq!(
            adapter.take_signals(),
            vec![PlayerSignal::Error {
                message: youtube_error_message(101)
            }]
        );
        assert_ne!(youtube_error_message(2), youtube_error_message(100));
    }

    #[test]
    fn test_youtube_skip_and_rate() {
        let (mut adapter, log) = ready_adapter();
        let now = Instant::now();
        assert!(adapter.skip(-30.0, now));
        assert_eq!(adapter.state().current_time, 0.0);
        assert_eq!(adapter.set_rate(1.4), 1.5);
        assert_eq!(adapter.set_rate(2.9), 2.0);
        assert_eq!(
            log.lock().unwrap().as_slice(),
            ["seek 0", "rate 1.5", "rate 2"]
        );
    }

    #[test]
    fn test_youtube_toggle_mute() {
        let (mut adapter, log) = ready_adapter();
        assert_eq!(adapter.toggle_mute(), Some(true));
        assert!(adapter.state().muted);
        assert_eq!(adapter.toggle_mute(), Some(false));
        assert_eq!(adapter.toggle_fullscreen(), None);
        assert_eq!(log.lock().unwrap().as_slice(), ["mute", "unmute"]);
    }

    #[test]
    fn test_youtube_not_ready_ignores_controls() {
        let api = FakeYouTube::default();
        let log = Arc::clone(&api.log);
        let mut adapter = YouTubeAdapter::new(api, "dQw4w9WgXcQ");
        assert!(!adapter.skip(5.0, Instant::now()));
        adapter.toggle_play(Instant::now());
        assert_eq!(adapter.toggle_mute(), None);
        assert!(log.lock().unwrap().is_empty());
        drop(adapter);
        assert_eq!(log.lock().unwrap().as_slice(), ["destroy"]);
    }

    #[test]
    fn test_iframe_reveal_flow() {
        let reference = classify("https://rumble.com/v4abcd-some-title.html");
        let mut adapter = IframeAdapter::for_reference(&reference)
            .unwrap()
            .with_poster(Some("https://img.example.com/p.jpg".into()))
            .with_branding_mask(true);

        assert_eq!(adapter.phase(), IframePhase::Poster);
        assert!(adapter.iframe().is_none());

        let spec = adapter.reveal().unwrap();
        assert_eq!(spec.src, "https://rumble.com/embed/v4abcd/?autoplay=2");
        assert!(spec.mask.is_some());
        assert!(adapter.shows_spinner());

        adapter.on_load();
        assert!(!adapter.shows_spinner());
        assert_eq!(adapter.phase(), IframePhase::Loaded);
    }

    #[test]
    fn test_streamtape_fallback_uses_embed_url() {
        let reference = classify("https://streamtape.com/v/AbC123/movie.mp4");
        let adapter = IframeAdapter::for_reference(&reference).unwrap();
        assert_eq!(adapter.embed_url(), "https://streamtape.com/e/AbC123/");
        assert_eq!(adapter.provider(), EmbedProvider::Streamtape);
    }

    #[test]
    fn test_iframe_error_signal() {
        let mut adapter = IframeAdapter::new(EmbedProvider::Facebook, "https://www.facebook.com/plugins/video.php");
        adapter.reveal();
        adapter.on_error("Embed blocked");
        assert_eq!(
            adapter.take_signals(),
            vec![PlayerSignal::Error {
                message: "Embed blocked".into()
            }]
        );
    }
}
