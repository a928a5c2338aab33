//! Native playback engine
//!
//! Drives one [`MediaBackend`] for an mp4 or HLS source:
//!
//! ```text
//! Idle ─► Initializing ─► Loading ─► Playing ⇄ Paused ─► Ended
//!                                      │        │
//!                                      └ overlays: buffering, manual play, error
//! ```
//!
//! The engine never sleeps or spawns. The host feeds it backend events and
//! the current time; timers are [`Watchdog`] deadlines surfaced through
//! [`PlaybackEngine::next_deadline`].

use crate::{
    backend::{EventSink, MediaBackend, MediaEvent, NativeSource},
    controls::{ControlAction, KeyInput},
    error::Error,
    preferences::{HlsQualityPreference, PreferenceStore, PreferencesPatch},
    surface::{PlaybackSurface, PlayerSignal},
    types::{clamp_rate, clamp_volume, PlaybackPhase, PlaybackState, PlayerConfig, QualityChoice, QualityLevel},
    watchdog::{earliest, Watchdog},
    Result,
};
use std::{sync::Arc, time::Instant};
use tracing::{debug, info, instrument, trace, warn};

/// Engine bound to one native source
pub struct PlaybackEngine<B: MediaBackend> {
    backend: B,
    source: NativeSource,
    sink: EventSink,
    config: PlayerConfig,
    preferences: Arc<dyn PreferenceStore>,
    stored_quality: HlsQualityPreference,
    state: PlaybackState,
    levels: Vec<QualityLevel>,
    autoplay: Watchdog,
    controls: Watchdog,
    autoplay_attempted: bool,
    ended_signalled: bool,
    signals: Vec<PlayerSignal>,
}

impl<B: MediaBackend> PlaybackEngine<B> {
    /// Apply stored preferences to the backend, then attach the source
    #[instrument(skip_all, fields(url = %source.url, format = ?source.format, generation = sink.generation()))]
    pub fn mount(
        backend: B,
        source: NativeSource,
        sink: EventSink,
        config: &PlayerConfig,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let stored = preferences.load().unwrap_or_default();
        let state = PlaybackState {
            volume: stored.volume,
            muted: stored.muted,
            playback_rate: stored.playback_rate,
            ..PlaybackState::default()
        };

        let mut engine = Self {
            backend,
            source,
            sink,
            config: config.clone(),
            preferences,
            stored_quality: stored.hls_quality,
            state,
            levels: Vec::new(),
            autoplay: Watchdog::new(config.autoplay_watchdog()),
            controls: Watchdog::new(config.controls_hide_after()),
            autoplay_attempted: false,
            ended_signalled: false,
            signals: Vec::new(),
        };

        engine.transition(PlaybackPhase::Initializing);
        engine.apply_media_properties();
        engine.attach();
        engine
    }

    fn apply_media_properties(&mut self) {
        self.backend.set_volume(self.state.volume);
        self.backend.set_muted(self.state.muted);
        self.backend.set_playback_rate(self.state.playback_rate);
    }

    fn attach(&mut self) {
        match self.backend.attach(&self.source, self.sink.clone()) {
            Ok(()) => {
                self.transition(PlaybackPhase::Loading);
                info!(url = %self.source.url, "Media source attached");
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn source(&self) -> &NativeSource {
        &self.source
    }

    pub fn generation(&self) -> u64 {
        self.sink.generation()
    }

    /// Levels from the last parsed manifest
    pub fn levels(&self) -> &[QualityLevel] {
        &self.levels
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Choices offered to the user: always `auto`, then every level
    pub fn quality_options(&self) -> Vec<QualityChoice> {
        std::iter::once(QualityChoice::Auto)
            .chain(self.levels.iter().map(|l| QualityChoice::Level(l.index)))
            .collect()
    }

    pub fn take_signals(&mut self) -> Vec<PlayerSignal> {
        std::mem::take(&mut self.signals)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([self.autoplay.deadline(), self.controls.deadline()])
    }

    fn transition(&mut self, to: PlaybackPhase) -> bool {
        let from = self.state.phase;
        if from == to {
            return true;
        }
        if !from.can_transition_to(to) {
            debug!(%from, %to, "Ignoring phase transition");
            return false;
        }
        debug!(%from, %to, "Phase transition");
        self.state.phase = to;
        true
    }

    /// Overlays that keep the controls on screen
    fn overlay_active(&self) -> bool {
        self.state.manual_play_needed || self.state.buffering || self.state.phase.pins_controls()
    }

    fn show_controls(&mut self) {
        self.state.controls_visible = true;
        self.controls.cancel();
    }

    /// Pointer, touch or keyboard activity
    pub fn user_activity(&mut self, now: Instant) {
        self.state.controls_visible = true;
        if self.state.playing {
            self.controls.arm(now);
        } else {
            self.controls.cancel();
        }
    }

    fn save(&self, patch: PreferencesPatch) {
        if let Err(e) = self.preferences.save(patch) {
            warn!(error = %e, "Failed to persist preferences");
        }
    }

    fn require_manual_play(&mut self) {
        self.autoplay.cancel();
        if !self.state.manual_play_needed {
            self.state.manual_play_needed = true;
            self.signals.push(PlayerSignal::ManualPlayNeeded);
        }
        self.show_controls();
    }

    fn attempt_autoplay(&mut self, now: Instant) {
        self.autoplay_attempted = true;
        match self.backend.play() {
            Ok(()) => self.autoplay.arm(now),
            Err(Error::AutoplayBlocked) => {
                info!("Autoplay blocked, waiting for user gesture");
                self.require_manual_play();
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "Autoplay attempt failed");
                self.require_manual_play();
            }
            Err(e) => self.fail(e),
        }
    }

    /// Destroy the decoder and enter the error phase
    fn fail(&mut self, error: Error) {
        warn!(error = %error, code = error.error_code(), "Playback failed");
        self.backend.detach();
        self.autoplay.cancel();
        self.state.playing = false;
        self.state.buffering = false;
        let message = error.to_string();
        self.state.error_message = Some(message.clone());
        self.transition(PlaybackPhase::Error);
        self.show_controls();
        self.signals.push(PlayerSignal::Error { message });
    }

    /// Feed one backend event
    pub fn handle_event(&mut self, event: MediaEvent, now: Instant) {
        if self.state.phase == PlaybackPhase::Error {
            trace!(?event, "Dropping event after failure");
            return;
        }

        match event {
            MediaEvent::LoadedMetadata { duration } => {
                self.state.duration = duration.max(0.0);
                if !self.autoplay_attempted {
                    self.attempt_autoplay(now);
                }
            }
            MediaEvent::DurationChange { duration } => {
                self.state.duration = duration.max(0.0);
            }
            MediaEvent::ManifestParsed { levels } => {
                // Some decoders announce the manifest without a payload
                let levels = if levels.is_empty() {
                    self.backend.enumerate_levels()
                } else {
                    levels
                };
                let choice = self.stored_quality.resolve(&levels);
                debug!(levels = levels.len(), %choice, "Manifest parsed");
                self.levels = levels;
                self.backend.set_level(choice.as_level());
                self.state.quality_level = choice;
            }
            MediaEvent::LevelSwitched { index } => {
                trace!(index, "Level switched");
            }
            MediaEvent::Play => {
                self.autoplay.cancel();
                self.state.manual_play_needed = false;
            }
            MediaEvent::Playing => {
                self.autoplay.cancel();
                self.state.manual_play_needed = false;
                self.state.playing = true;
                self.state.buffering = false;
                self.ended_signalled = false;
                self.transition(PlaybackPhase::Playing);
                self.user_activity(now);
            }
            MediaEvent::Pause => {
                self.state.playing = false;
                if self.state.phase != PlaybackPhase::Ended {
                    self.transition(PlaybackPhase::Paused);
                }
                self.show_controls();
            }
            MediaEvent::Waiting => {
                self.state.buffering = true;
                self.show_controls();
            }
            MediaEvent::CanPlay => {
                self.state.buffering = false;
            }
            MediaEvent::TimeUpdate { current_time } => {
                self.state.current_time = current_time.max(0.0);
            }
            MediaEvent::Progress { buffered_end } => {
                self.state.buffered_pct = if self.state.duration > 0.0 {
                    (buffered_end / self.state.duration * 100.0).clamp(0.0, 100.0)
                } else {
                    0.0
                };
            }
            MediaEvent::Ended => {
                self.state.playing = false;
                self.state.buffering = false;
                self.transition(PlaybackPhase::Ended);
                self.show_controls();
                if !self.ended_signalled {
                    self.ended_signalled = true;
                    info!("Playback ended");
                    self.signals.push(PlayerSignal::Ended);
                }
            }
            MediaEvent::Error { message } => self.fail(Error::MediaElement(message)),
            MediaEvent::HlsError { fatal: true, details } => self.fail(Error::HlsFatal(details)),
            MediaEvent::HlsError { fatal: false, details } => {
                warn!(details = %details, "Non-fatal HLS error");
            }
            MediaEvent::FullscreenChanged { fullscreen } => {
                self.state.fullscreen = fullscreen;
            }
        }
    }

    /// Advance timers to `now`
    pub fn tick(&mut self, now: Instant) {
        if self.autoplay.fire_if_expired(now) && !self.state.playing {
            info!(
                timeout_ms = self.autoplay.timeout().as_millis() as u64,
                "Autoplay did not start"
            );
            self.require_manual_play();
        }
        if self.controls.fire_if_expired(now) && self.state.playing && !self.overlay_active() {
            self.state.controls_visible = false;
        }
    }

    /// User-initiated play
    pub fn play(&mut self, now: Instant) -> Result<()> {
        if !self.backend.is_attached() {
            return Err(Error::NotAttached);
        }
        self.user_activity(now);
        if self.state.phase == PlaybackPhase::Ended {
            self.backend.seek(0.0);
            self.state.current_time = 0.0;
        }
        match self.backend.play() {
            Ok(()) => {
                self.autoplay.cancel();
                self.state.manual_play_needed = false;
                Ok(())
            }
            Err(e) => {
                if matches!(e, Error::AutoplayBlocked) {
                    self.require_manual_play();
                }
                Err(e)
            }
        }
    }

    pub fn pause(&mut self, now: Instant) {
        self.backend.pause();
        self.user_activity(now);
    }

    pub fn toggle_play(&mut self, now: Instant) -> Result<()> {
        if self.state.playing {
            self.pause(now);
            Ok(())
        } else {
            self.play(now)
        }
    }

    /// Seek, clamped to `[0, duration]` (unbounded above while the duration
    /// is unknown). Non-finite targets are ignored. Returns the applied
    /// position.
    pub fn seek_to(&mut self, time: f64, now: Instant) -> f64 {
        if !time.is_finite() {
            debug!(time, "Ignoring non-finite seek target");
            self.user_activity(now);
            return self.state.current_time;
        }
        let upper = if self.state.duration > 0.0 {
            self.state.duration
        } else {
            f64::INFINITY
        };
        let time = time.clamp(0.0, upper);

        self.backend.seek(time);
        self.state.current_time = time;
        if self.state.phase == PlaybackPhase::Ended && time < self.state.duration {
            self.ended_signalled = false;
            self.transition(PlaybackPhase::Paused);
        }
        self.user_activity(now);
        time
    }

    pub fn skip(&mut self, seconds: f64, now: Instant) -> f64 {
        self.seek_to(self.state.current_time + seconds, now)
    }

    /// Clamp to `[0, 1]`; a positive volume unmutes
    pub fn set_volume(&mut self, volume: f64) -> f64 {
        let volume = clamp_volume(volume);
        if volume > 0.0 && self.state.muted {
            self.state.muted = false;
            self.backend.set_muted(false);
        }
        self.state.volume = volume;
        self.backend.set_volume(volume);
        self.save(PreferencesPatch::volume(volume, self.state.muted));
        volume
    }

    pub fn toggle_mute(&mut self) -> bool {
        let muted = !self.state.muted;
        self.state.muted = muted;
        self.backend.set_muted(muted);
        self.save(PreferencesPatch::muted(muted));
        muted
    }

    /// Clamp to `[0.25, 3]`
    pub fn set_rate(&mut self, rate: f64) -> f64 {
        let rate = clamp_rate(rate);
        self.state.playback_rate = rate;
        self.backend.set_playback_rate(rate);
        self.save(PreferencesPatch::playback_rate(rate));
        rate
    }

    /// Select a level (or automatic switching). HLS only; an unknown index
    /// is rejected and leaves the state untouched.
    pub fn set_quality(&mut self, choice: QualityChoice) -> Result<()> {
        if !self.source.is_hls() {
            return Err(Error::QualityUnavailable);
        }
        if let QualityChoice::Level(index) = choice {
            if !self.levels.iter().any(|l| l.index == index) {
                return Err(Error::InvalidQualityLevel(index));
            }
        }

        self.backend.set_level(choice.as_level());
        self.state.quality_level = choice;
        let stored = HlsQualityPreference::from_choice(choice, &self.levels);
        self.stored_quality = stored;
        self.save(PreferencesPatch::hls_quality(stored));
        info!(%choice, "Quality selected");
        Ok(())
    }

    pub fn toggle_fullscreen(&mut self) -> Result<bool> {
        let fullscreen = !self.state.fullscreen;
        self.backend.set_fullscreen(fullscreen)?;
        self.state.fullscreen = fullscreen;
        Ok(fullscreen)
    }

    /// Re-attach after a fatal error. `sink` must carry a fresh generation so
    /// events from the failed attach are dropped.
    pub fn retry(&mut self, sink: EventSink) -> Result<()> {
        if self.state.phase != PlaybackPhase::Error {
            return Err(Error::InvalidStateTransition {
                from: self.state.phase.to_string(),
                to: PlaybackPhase::Initializing.to_string(),
            });
        }
        info!(url = %self.source.url, "Retrying playback");

        self.backend.detach();
        self.sink = sink;
        self.state = PlaybackState {
            volume: self.state.volume,
            muted: self.state.muted,
            playback_rate: self.state.playback_rate,
            phase: PlaybackPhase::Error,
            ..PlaybackState::default()
        };
        self.levels.clear();
        self.autoplay_attempted = false;
        self.ended_signalled = false;
        self.autoplay.cancel();
        self.controls.cancel();

        self.transition(PlaybackPhase::Initializing);
        self.apply_media_properties();
        self.attach();
        Ok(())
    }

    /// Apply a keyboard shortcut; returns the action taken
    pub fn handle_key(&mut self, input: KeyInput, now: Instant) -> Option<ControlAction> {
        let action = ControlAction::from_key(input)?;
        self.user_activity(now);

        match action {
            ControlAction::TogglePlay => {
                if let Err(e) = self.toggle_play(now) {
                    debug!(error = %e, "Play toggle rejected");
                }
            }
            ControlAction::ToggleMute => {
                self.toggle_mute();
            }
            ControlAction::ToggleFullscreen => {
                if let Err(e) = self.toggle_fullscreen() {
                    debug!(error = %e, "Fullscreen toggle rejected");
                }
            }
            ControlAction::SeekBackward => {
                self.skip(-self.config.seek_step, now);
            }
            ControlAction::SeekForward => {
                self.skip(self.config.seek_step, now);
            }
            ControlAction::VolumeUp => {
                self.set_volume(self.state.volume + self.config.volume_step);
            }
            ControlAction::VolumeDown => {
                self.set_volume(self.state.volume - self.config.volume_step);
            }
            ControlAction::RateUp => {
                self.set_rate(self.state.playback_rate + self.config.rate_step);
            }
            ControlAction::RateDown => {
                self.set_rate(self.state.playback_rate - self.config.rate_step);
            }
        }
        Some(action)
    }

    /// Detach the backend and clear every timer
    pub fn teardown(&mut self) {
        self.autoplay.cancel();
        self.controls.cancel();
        if self.backend.is_attached() {
            self.backend.detach();
            debug!(generation = self.sink.generation(), "Engine torn down");
        }
    }
}

impl<B: MediaBackend> Drop for PlaybackEngine<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl<B: MediaBackend> PlaybackSurface for PlaybackEngine<B> {
    fn state(&self) -> &PlaybackState {
        &self.state
    }

    fn toggle_play(&mut self, now: Instant) {
        if let Err(e) = PlaybackEngine::toggle_play(self, now) {
            debug!(error = %e, "Play toggle rejected");
        }
    }

    fn skip(&mut self, seconds: f64, now: Instant) -> bool {
        PlaybackEngine::skip(self, seconds, now);
        true
    }

    fn set_rate(&mut self, rate: f64) -> f64 {
        PlaybackEngine::set_rate(self, rate)
    }

    fn toggle_mute(&mut self) -> Option<bool> {
        Some(PlaybackEngine::toggle_mute(self))
    }

    fn toggle_fullscreen(&mut self) -> Option<bool> {
        match PlaybackEngine::toggle_fullscreen(self) {
            Ok(fullscreen) => Some(fullscreen),
            Err(e) => {
                debug!(error = %e, "Fullscreen toggle rejected");
                None
            }
        }
    }

    fn take_signals(&mut self) -> Vec<PlayerSignal> {
        PlaybackEngine::take_signals(self)
    }

    fn next_deadline(&self) -> Option<Instant> {
        PlaybackEngine::next_deadline(self)
    }

    fn tick(&mut self, now: Instant) {
        PlaybackEngine::tick(self, now)
    }

    fn teardown(&mut self) {
        PlaybackEngine::teardown(self)
    }
}
