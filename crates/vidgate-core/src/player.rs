//! Player host - owns the one mounted surface for a visible player
//!
//! Coordinates:
//! - Classification and dispatch by kind (engine, YouTube, iframe)
//! - Streamtape resolution with a timeout and embed fallback
//! - Teardown of the previous surface before the next is created
//! - Timers, backend events and playlist auto-advance
//!
//! The host is a single cooperative task. [`Player::next_signal`] waits on
//! backend events, resolver results and the earliest timer deadline.

use crate::{
    backend::{EventSink, GenerationEvent, HeadlessBackend, MediaBackend, NativeSource},
    classify::classify,
    controls::{ControlAction, KeyInput},
    embed::{IframeAdapter, IframeSpec, YouTubeAdapter, YouTubePlayerApi},
    engine::PlaybackEngine,
    error::Error,
    manifest::HlsManifestClient,
    playlist::{PlaylistContext, PlaylistDriver},
    preferences::PreferenceStore,
    resolver::{RequestToken, ResolutionTracker, ResolveStreamtape},
    surface::{PlaybackSurface, PlayerSignal},
    types::{MediaKind, MediaReference, MediaSource, PlaybackState, PlayerConfig, SessionId},
    Result,
};
use serde::Serialize;
use std::{collections::VecDeque, sync::Arc};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, info, instrument, trace, warn};

/// Creates the platform objects behind each mounted surface
pub trait SurfaceFactory: Send {
    type Backend: MediaBackend;
    type YouTube: YouTubePlayerApi;

    fn create_backend(&mut self) -> Self::Backend;

    /// `None` renders YouTube through the plain iframe adapter
    fn create_youtube(&mut self, video_id: &str) -> Option<Self::YouTube>;
}

/// Which surface is mounted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    Empty,
    Native,
    Youtube,
    Iframe,
    Resolving,
    NotPlayable,
}

/// Snapshot published on every change
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub session: String,
    pub generation: u64,
    pub reference: Option<MediaReference>,
    pub surface: SurfaceKind,
    pub playback: PlaybackState,
    pub notice: Option<String>,
}

enum Mounted<B: MediaBackend, Y: YouTubePlayerApi> {
    Empty,
    Native(PlaybackEngine<B>),
    Youtube(YouTubeAdapter<Y>),
    Iframe(IframeAdapter),
    Resolving,
    NotPlayable(String),
}

impl<B: MediaBackend, Y: YouTubePlayerApi> Mounted<B, Y> {
    fn kind(&self) -> SurfaceKind {
        match self {
            Mounted::Empty => SurfaceKind::Empty,
            Mounted::Native(_) => SurfaceKind::Native,
            Mounted::Youtube(_) => SurfaceKind::Youtube,
            Mounted::Iframe(_) => SurfaceKind::Iframe,
            Mounted::Resolving => SurfaceKind::Resolving,
            Mounted::NotPlayable(_) => SurfaceKind::NotPlayable,
        }
    }

    fn surface(&self) -> Option<&dyn PlaybackSurface> {
        match self {
            Mounted::Native(engine) => Some(engine),
            Mounted::Youtube(adapter) => Some(adapter),
            Mounted::Iframe(adapter) => Some(adapter),
            _ => None,
        }
    }

    fn surface_mut(&mut self) -> Option<&mut dyn PlaybackSurface> {
        match self {
            Mounted::Native(engine) => Some(engine),
            Mounted::Youtube(adapter) => Some(adapter),
            Mounted::Iframe(adapter) => Some(adapter),
            _ => None,
        }
    }
}

struct ResolutionOutcome {
    token: RequestToken,
    generation: u64,
    result: Result<String>,
}

/// Host for one visible player
pub struct Player<F: SurfaceFactory> {
    id: SessionId,
    config: PlayerConfig,
    factory: F,
    resolver: Arc<dyn ResolveStreamtape>,
    preferences: Arc<dyn PreferenceStore>,
    mounted: Mounted<F::Backend, F::YouTube>,
    current: Option<MediaReference>,
    generation: u64,
    media_tx: mpsc::UnboundedSender<GenerationEvent>,
    media_rx: mpsc::UnboundedReceiver<GenerationEvent>,
    resolve_tx: mpsc::UnboundedSender<ResolutionOutcome>,
    resolve_rx: mpsc::UnboundedReceiver<ResolutionOutcome>,
    tracker: ResolutionTracker,
    resolve_task: Option<JoinHandle<()>>,
    playlist: Option<PlaylistDriver>,
    signals: VecDeque<PlayerSignal>,
    view_tx: watch::Sender<PlayerView>,
}

impl<F: SurfaceFactory> Player<F> {
    pub fn new(
        config: PlayerConfig,
        factory: F,
        resolver: Arc<dyn ResolveStreamtape>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        let id = SessionId::new();
        let (media_tx, media_rx) = mpsc::unbounded_channel();
        let (resolve_tx, resolve_rx) = mpsc::unbounded_channel();
        let (view_tx, _) = watch::channel(PlayerView {
            session: id.to_string(),
            generation: 0,
            reference: None,
            surface: SurfaceKind::Empty,
            playback: PlaybackState::default(),
            notice: None,
        });

        Self {
            id,
            config,
            factory,
            resolver,
            preferences,
            mounted: Mounted::Empty,
            current: None,
            generation: 0,
            media_tx,
            media_rx,
            resolve_tx,
            resolve_rx,
            tracker: ResolutionTracker::new(),
            resolve_task: None,
            playlist: None,
            signals: VecDeque::new(),
            view_tx,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn current(&self) -> Option<&MediaReference> {
        self.current.as_ref()
    }

    pub fn surface_kind(&self) -> SurfaceKind {
        self.mounted.kind()
    }

    pub fn playlist(&self) -> Option<&PlaylistDriver> {
        self.playlist.as_ref()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerView> {
        self.view_tx.subscribe()
    }

    pub fn view(&self) -> PlayerView {
        let notice = match &self.mounted {
            Mounted::NotPlayable(message) => Some(message.clone()),
            _ => None,
        };
        PlayerView {
            session: self.id.to_string(),
            generation: self.generation,
            reference: self.current.clone(),
            surface: self.mounted.kind(),
            playback: self
                .mounted
                .surface()
                .map(|s| s.state().clone())
                .unwrap_or_default(),
            notice,
        }
    }

    fn publish(&self) {
        self.view_tx.send_replace(self.view());
    }

    pub fn surface_mut(&mut self) -> Option<&mut dyn PlaybackSurface> {
        self.mounted.surface_mut()
    }

    pub fn engine_mut(&mut self) -> Option<&mut PlaybackEngine<F::Backend>> {
        match &mut self.mounted {
            Mounted::Native(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn youtube_mut(&mut self) -> Option<&mut YouTubeAdapter<F::YouTube>> {
        match &mut self.mounted {
            Mounted::Youtube(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn iframe_mut(&mut self) -> Option<&mut IframeAdapter> {
        match &mut self.mounted {
            Mounted::Iframe(adapter) => Some(adapter),
            _ => None,
        }
    }

    /// Run `f` against the mounted YouTube adapter, then surface its signals
    fn with_youtube<R>(&mut self, f: impl FnOnce(&mut YouTubeAdapter<F::YouTube>) -> R) -> Option<R> {
        let out = match &mut self.mounted {
            Mounted::Youtube(adapter) => f(adapter),
            _ => return None,
        };
        self.collect_signals();
        self.publish();
        Some(out)
    }

    fn with_iframe<R>(&mut self, f: impl FnOnce(&mut IframeAdapter) -> R) -> Option<R> {
        let out = match &mut self.mounted {
            Mounted::Iframe(adapter) => f(adapter),
            _ => return None,
        };
        self.collect_signals();
        self.publish();
        Some(out)
    }

    /// IFrame API `onReady`; returns false when no YouTube player is mounted
    pub fn on_youtube_ready(&mut self) -> bool {
        self.with_youtube(|adapter| adapter.on_ready()).is_some()
    }

    /// IFrame API `onStateChange`. An end of playback advances an attached
    /// playlist.
    pub fn on_youtube_state(&mut self, code: i32) -> bool {
        self.with_youtube(|adapter| adapter.on_state_change(code)).is_some()
    }

    /// IFrame API `onError`
    pub fn on_youtube_error(&mut self, code: i32) -> bool {
        self.with_youtube(|adapter| adapter.on_error(code)).is_some()
    }

    /// User interaction on an embed poster; returns the iframe to render
    pub fn reveal_embed(&mut self) -> Option<IframeSpec> {
        self.with_iframe(IframeAdapter::reveal).flatten()
    }

    /// The embed iframe fired `load`
    pub fn on_embed_load(&mut self) -> bool {
        self.with_iframe(IframeAdapter::on_load).is_some()
    }

    /// The embed iframe failed to load or was refused by the vendor
    pub fn on_embed_error(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.with_iframe(|adapter| adapter.on_error(message)).is_some()
    }

    /// Classify a raw link and present it
    pub fn present(&mut self, raw_url: &str) {
        self.present_reference(classify(raw_url));
    }

    /// Tear down whatever is mounted, then mount a surface for `reference`
    #[instrument(skip(self, reference), fields(session = %self.id, kind = %reference.kind()))]
    pub fn present_reference(&mut self, reference: MediaReference) {
        self.teardown();
        self.generation += 1;
        info!(url = %reference.raw_url(), generation = self.generation, "Presenting source");

        self.mounted = match reference.kind() {
            MediaKind::Hls | MediaKind::Mp4 => match NativeSource::from_reference(&reference) {
                Ok(source) => self.mount_native(source),
                Err(e) => self.not_playable(e.to_string()),
            },
            MediaKind::Streamtape => {
                self.start_resolution(reference.raw_url().to_string());
                Mounted::Resolving
            }
            MediaKind::Youtube => self.mount_youtube(&reference),
            MediaKind::Facebook | MediaKind::Rumble | MediaKind::Odysee => {
                self.mount_iframe(&reference)
            }
            MediaKind::Generic | MediaKind::Unknown => {
                self.not_playable("This link is not a playable video.".to_string())
            }
        };

        self.current = Some(reference);
        let generation = self.generation;
        if let Some(playlist) = self.playlist.as_mut() {
            playlist.mark_mounted(generation);
        }
        self.collect_signals();
        self.publish();
    }

    fn mount_native(&mut self, source: NativeSource) -> Mounted<F::Backend, F::YouTube> {
        let backend = self.factory.create_backend();
        let sink = EventSink::new(self.generation, self.media_tx.clone());
        Mounted::Native(PlaybackEngine::mount(
            backend,
            source,
            sink,
            &self.config,
            Arc::clone(&self.preferences),
        ))
    }

    fn mount_youtube(&mut self, reference: &MediaReference) -> Mounted<F::Backend, F::YouTube> {
        if let MediaSource::Youtube { video_id } = reference.source() {
            if let Some(api) = self.factory.create_youtube(video_id) {
                return Mounted::Youtube(YouTubeAdapter::new(api, video_id.clone()));
            }
        }
        self.mount_iframe(reference)
    }

    fn mount_iframe(&mut self, reference: &MediaReference) -> Mounted<F::Backend, F::YouTube> {
        match IframeAdapter::for_reference(reference) {
            Some(adapter) => Mounted::Iframe(
                adapter
                    .with_poster(self.poster())
                    .with_branding_mask(true),
            ),
            None => self.not_playable(format!("No embed available for {} links.", reference.kind())),
        }
    }

    fn not_playable(&mut self, message: String) -> Mounted<F::Backend, F::YouTube> {
        info!(reason = %message, "Source not playable");
        self.signals.push_back(PlayerSignal::NotPlayable {
            message: message.clone(),
        });
        Mounted::NotPlayable(message)
    }

    fn poster(&self) -> Option<String> {
        self.playlist
            .as_ref()
            .and_then(|p| p.poster())
            .map(str::to_string)
    }

    fn start_resolution(&mut self, raw_url: String) {
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        let token = self.tracker.begin();
        let generation = self.generation;
        let resolver = Arc::clone(&self.resolver);
        let tx = self.resolve_tx.clone();
        let timeout = self.config.resolver_timeout();

        debug!(token = token.value(), "Starting Streamtape resolution");
        self.resolve_task = Some(tokio::spawn(async move {
            let result = match tokio::time::timeout(timeout, resolver.resolve(&raw_url)).await {
                Ok(result) => result,
                Err(_) => Err(Error::ResolutionTimeout(timeout)),
            };
            let _ = tx.send(ResolutionOutcome {
                token,
                generation,
                result,
            });
        }));
    }

    fn apply_resolution(&mut self, outcome: ResolutionOutcome) {
        if outcome.generation != self.generation || !self.tracker.complete(outcome.token) {
            debug!(token = outcome.token.value(), "Discarding stale resolution");
            return;
        }
        self.resolve_task = None;
        let Some(reference) = self.current.clone() else {
            return;
        };

        match outcome.result {
            Ok(url) => {
                info!(url = %url, "Streamtape resolved, playing natively");
                self.signals.push_back(PlayerSignal::Resolved { url: url.clone() });
                self.mounted = self.mount_native(NativeSource::progressive(url));
            }
            Err(e) => {
                warn!(error = %e, code = e.error_code(), "Streamtape resolution failed");
                self.mount_fallback(&reference, e.to_string());
            }
        }
    }

    fn mount_fallback(&mut self, reference: &MediaReference, reason: String) {
        let Some(adapter) = IframeAdapter::for_reference(reference) else {
            self.mounted = self.not_playable(reason);
            return;
        };
        let adapter = adapter.with_poster(self.poster()).with_branding_mask(true);
        self.signals.push_back(PlayerSignal::FallbackEmbed {
            embed_url: adapter.embed_url().to_string(),
            reason,
        });
        self.mounted = Mounted::Iframe(adapter);
    }

    /// Start a new resolution for the current Streamtape link, superseding
    /// any in flight
    pub fn retry_resolution(&mut self) -> bool {
        match self.current.clone() {
            Some(reference) if reference.kind() == MediaKind::Streamtape => {
                self.present_reference(reference);
                true
            }
            _ => false,
        }
    }

    /// Skip a pending resolution and show the Streamtape embed
    pub fn use_embed_now(&mut self) -> bool {
        if !matches!(self.mounted, Mounted::Resolving) {
            return false;
        }
        let Some(reference) = self.current.clone() else {
            return false;
        };
        self.tracker.invalidate();
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        self.mount_fallback(&reference, "embed requested".to_string());
        self.publish();
        true
    }

    /// Recover from an error: re-attach a failed engine, re-present anything else
    pub fn retry(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let sink = EventSink::new(generation, self.media_tx.clone());
        if let Mounted::Native(engine) = &mut self.mounted {
            if engine.retry(sink).is_ok() {
                if let Some(playlist) = self.playlist.as_mut() {
                    playlist.mark_mounted(generation);
                }
                self.collect_signals();
                self.publish();
                return;
            }
        }
        if let Some(reference) = self.current.clone() {
            self.present_reference(reference);
        }
    }

    /// Apply a keyboard shortcut to whichever surface is mounted
    pub fn handle_key(&mut self, input: KeyInput) -> Option<ControlAction> {
        let now = Instant::now().into_std();
        let seek_step = self.config.seek_step;
        let rate_step = self.config.rate_step;

        let action = match &mut self.mounted {
            Mounted::Native(engine) => engine.handle_key(input, now),
            other => {
                let action = ControlAction::from_key(input)?;
                let surface = other.surface_mut()?;
                match action {
                    ControlAction::TogglePlay => surface.toggle_play(now),
                    ControlAction::ToggleMute => {
                        surface.toggle_mute()?;
                    }
                    ControlAction::ToggleFullscreen => {
                        surface.toggle_fullscreen()?;
                    }
                    ControlAction::SeekBackward => {
                        surface.skip(-seek_step, now);
                    }
                    ControlAction::SeekForward => {
                        surface.skip(seek_step, now);
                    }
                    ControlAction::RateUp => {
                        let rate = surface.state().playback_rate + rate_step;
                        surface.set_rate(rate);
                    }
                    ControlAction::RateDown => {
                        let rate = surface.state().playback_rate - rate_step;
                        surface.set_rate(rate);
                    }
                    _ => return None,
                }
                Some(action)
            }
        };
        self.collect_signals();
        self.publish();
        action
    }

    /// Take over a playlist and present its current entry
    pub fn load_playlist(&mut self, context: PlaylistContext) -> bool {
        let driver = PlaylistDriver::new(context);
        let Some(reference) = driver.current() else {
            return false;
        };
        self.playlist = Some(driver);
        self.present_reference(reference);
        true
    }

    pub fn playlist_next(&mut self) -> bool {
        match self.playlist.as_mut().and_then(PlaylistDriver::next) {
            Some(reference) => {
                self.present_reference(reference);
                true
            }
            None => false,
        }
    }

    pub fn playlist_previous(&mut self) -> bool {
        match self.playlist.as_mut().and_then(PlaylistDriver::previous) {
            Some(reference) => {
                self.present_reference(reference);
                true
            }
            None => false,
        }
    }

    fn dispatch_media(&mut self, event: GenerationEvent) {
        if event.generation != self.generation {
            trace!(generation = event.generation, current = self.generation, "Dropping stale media event");
            return;
        }
        if let Mounted::Native(engine) = &mut self.mounted {
            engine.handle_event(event.event, Instant::now().into_std());
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.mounted
            .surface()
            .and_then(|s| s.next_deadline())
            .map(Instant::from_std)
    }

    fn tick(&mut self) {
        let now = Instant::now().into_std();
        if let Some(surface) = self.mounted.surface_mut() {
            surface.tick(now);
        }
    }

    /// Move surface signals into the host queue; an end of playback with a
    /// playlist attached advances it. Returns false when nothing was pending.
    fn collect_signals(&mut self) -> bool {
        let drained = self
            .mounted
            .surface_mut()
            .map(|s| s.take_signals())
            .unwrap_or_default();
        if drained.is_empty() {
            return false;
        }

        for signal in drained {
            let advance = signal == PlayerSignal::Ended;
            self.signals.push_back(signal);
            if advance {
                let generation = self.generation;
                if let Some(next) = self.playlist.as_mut().and_then(|p| p.on_ended(generation)) {
                    self.present_reference(next);
                    return true;
                }
            }
        }
        true
    }

    /// Process events, resolutions and timers until a signal is available
    pub async fn next_signal(&mut self) -> PlayerSignal {
        loop {
            // Adapters driven directly through `youtube_mut`/`iframe_mut`
            if self.collect_signals() {
                self.publish();
            }
            if let Some(signal) = self.signals.pop_front() {
                return signal;
            }

            let deadline = self.next_deadline();
            tokio::select! {
                Some(event) = self.media_rx.recv() => self.dispatch_media(event),
                Some(outcome) = self.resolve_rx.recv() => self.apply_resolution(outcome),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => self.tick(),
            }

            self.collect_signals();
            self.publish();
        }
    }

    /// Release the mounted surface, cancel resolution and clear timers
    pub fn teardown(&mut self) {
        if let Some(task) = self.resolve_task.take() {
            task.abort();
        }
        if self.tracker.is_pending() {
            self.tracker.invalidate();
        }
        if let Some(surface) = self.mounted.surface_mut() {
            surface.teardown();
        }
        self.mounted = Mounted::Empty;
    }
}

impl<F: SurfaceFactory> Drop for Player<F> {
    fn drop(&mut self) {
        self.teardown();
    }
}

// =============================================================================
// Headless surfaces
// =============================================================================

/// Placeholder for hosts without a YouTube binding
pub enum NoYouTubeApi {}

impl YouTubePlayerApi for NoYouTubeApi {
    fn play_video(&mut self) {
        match *self {}
    }
    fn pause_video(&mut self) {
        match *self {}
    }
    fn seek_to(&mut self, _seconds: f64, _allow_seek_ahead: bool) {
        match *self {}
    }
    fn current_time(&self) -> f64 {
        match *self {}
    }
    fn duration(&self) -> f64 {
        match *self {}
    }
    fn available_playback_rates(&self) -> Vec<f64> {
        match *self {}
    }
    fn set_playback_rate(&mut self, _rate: f64) {
        match *self {}
    }
    fn mute(&mut self) {
        match *self {}
    }
    fn un_mute(&mut self) {
        match *self {}
    }
    fn is_muted(&self) -> bool {
        match *self {}
    }
    fn destroy(&mut self) {
        match *self {}
    }
}

/// Factory for display-less hosts (CLI, tests)
pub struct HeadlessSurfaces {
    client: reqwest::Client,
    manifests: HlsManifestClient,
    autoplay_blocked: bool,
}

impl HeadlessSurfaces {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.resolver_timeout())
            .build()?;
        Ok(Self {
            manifests: HlsManifestClient::with_client(client.clone()),
            client,
            autoplay_blocked: false,
        })
    }

    pub fn with_autoplay_blocked(mut self, blocked: bool) -> Self {
        self.autoplay_blocked = blocked;
        self
    }
}

impl SurfaceFactory for HeadlessSurfaces {
    type Backend = HeadlessBackend;
    type YouTube = NoYouTubeApi;

    fn create_backend(&mut self) -> HeadlessBackend {
        let backend = HeadlessBackend::new(self.client.clone(), self.manifests.clone());
        if self.autoplay_blocked {
            backend.with_autoplay_blocked()
        } else {
            backend
        }
    }

    fn create_youtube(&mut self, _video_id: &str) -> Option<NoYouTubeApi> {
        None
    }
}
