//! Integration tests for Vidgate Core

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::assert_ok;
use vidgate_core::{
    classify, EventSink, Error, MediaBackend, MediaEvent, MediaKind, MemoryPreferenceStore,
    NativeSource, PlaybackPhase, Player, PlayerConfig, PlayerSignal, PlaylistContext, Preferences,
    QualityChoice, QualityLevel, ResolveStreamtape, Result, SurfaceFactory, SurfaceKind,
    YouTubePlayerApi,
};

// =============================================================================
// Fakes
// =============================================================================

/// Shared view into every backend a factory has created
#[derive(Clone, Default)]
struct Probe {
    calls: Arc<Mutex<Vec<String>>>,
    live: Arc<AtomicUsize>,
    max_live: Arc<AtomicUsize>,
    sink: Arc<Mutex<Option<EventSink>>>,
}

impl Probe {
    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn emit(&self, event: MediaEvent) {
        let sink = self.sink.lock().unwrap();
        sink.as_ref().expect("no backend attached").emit(event);
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct FakeBackend {
    probe: Probe,
    attached: bool,
    block_autoplay: bool,
    metadata_on_attach: Option<f64>,
}

impl MediaBackend for FakeBackend {
    fn attach(&mut self, source: &NativeSource, events: EventSink) -> Result<()> {
        self.probe.record(format!("attach {}", source.url));
        let live = self.probe.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.probe.max_live.fetch_max(live, Ordering::SeqCst);
        self.attached = true;
        if let Some(duration) = self.metadata_on_attach {
            events.emit(MediaEvent::LoadedMetadata { duration });
        }
        *self.probe.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    fn detach(&mut self) {
        if self.attached {
            self.attached = false;
            self.probe.live.fetch_sub(1, Ordering::SeqCst);
            self.probe.record("detach");
        }
    }

    fn is_attached(&self) -> bool {
        self.attached
    }

    fn enumerate_levels(&self) -> Vec<QualityLevel> {
        Vec::new()
    }

    fn play(&mut self) -> Result<()> {
        self.probe.record("play");
        if self.block_autoplay {
            return Err(Error::AutoplayBlocked);
        }
        Ok(())
    }

    fn pause(&mut self) {
        self.probe.record("pause");
    }

    fn seek(&mut self, time: f64) {
        self.probe.record(format!("seek {}", time));
    }

    fn set_volume(&mut self, volume: f64) {
        self.probe.record(format!("volume {}", volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.probe.record(format!("muted {}", muted));
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.probe.record(format!("rate {}", rate));
    }

    fn set_level(&mut self, level: Option<usize>) {
        self.probe.record(format!("level {:?}", level));
    }

    fn set_fullscreen(&mut self, _fullscreen: bool) -> Result<()> {
        Ok(())
    }
}

struct FakeYouTube {
    probe: Probe,
}

impl YouTubePlayerApi for FakeYouTube {
    fn play_video(&mut self) {
        self.probe.record("yt play");
    }
    fn pause_video(&mut self) {
        self.probe.record("yt pause");
    }
    fn seek_to(&mut self, seconds: f64, _allow_seek_ahead: bool) {
        self.probe.record(format!("yt seek {}", seconds));
    }
    fn current_time(&self) -> f64 {
        0.0
    }
    fn duration(&self) -> f64 {
        120.0
    }
    fn available_playback_rates(&self) -> Vec<f64> {
        vec![0.5, 1.0, 1.5, 2.0]
    }
    fn set_playback_rate(&mut self, rate: f64) {
        self.probe.record(format!("yt rate {}", rate));
    }
    fn mute(&mut self) {
        self.probe.record("yt mute");
    }
    fn un_mute(&mut self) {
        self.probe.record("yt unmute");
    }
    fn is_muted(&self) -> bool {
        false
    }
    fn destroy(&mut self) {
        self.probe.record("yt destroy");
    }
}

#[derive(Default)]
struct FakeFactory {
    probe: Probe,
    block_autoplay: bool,
    metadata_on_attach: Option<f64>,
}

impl SurfaceFactory for FakeFactory {
    type Backend = FakeBackend;
    type YouTube = FakeYouTube;

    fn create_backend(&mut self) -> FakeBackend {
        FakeBackend {
            probe: self.probe.clone(),
            attached: false,
            block_autoplay: self.block_autoplay,
            metadata_on_attach: self.metadata_on_attach,
        }
    }

    fn create_youtube(&mut self, _video_id: &str) -> Option<FakeYouTube> {
        Some(FakeYouTube {
            probe: self.probe.clone(),
        })
    }
}

/// Resolver answering from a script of `(delay, result)` pairs
#[derive(Default)]
struct ScriptedResolver {
    script: Mutex<VecDeque<(Duration, Result<String>)>>,
    calls: AtomicUsize,
}

impl ScriptedResolver {
    fn new(script: Vec<(Duration, Result<String>)>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ResolveStreamtape for ScriptedResolver {
    async fn resolve(&self, _raw_url: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some((delay, result)) => {
                tokio::time::sleep(delay).await;
                result
            }
            None => Err(Error::ResolutionNetwork("script exhausted".into())),
        }
    }
}

fn player_with(
    factory: FakeFactory,
    resolver: Arc<ScriptedResolver>,
    preferences: Preferences,
) -> Player<FakeFactory> {
    Player::new(
        PlayerConfig::default(),
        factory,
        resolver,
        Arc::new(MemoryPreferenceStore::with_preferences(preferences)),
    )
}

const STREAMTAPE: &str = "https://streamtape.com/v/AbC123xyz/movie.mp4";

// =============================================================================
// Classifier Tests
// =============================================================================

#[test]
fn test_youtube_forms_canonicalize_identically() {
    let forms = [
        "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
        "https://youtu.be/dQw4w9WgXcQ",
        "https://youtube.com/shorts/dQw4w9WgXcQ",
        "https://m.youtube.com/watch?v=dQw4w9WgXcQ&t=42",
        "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
    ];
    for form in forms {
        let reference = classify(form);
        assert_eq!(reference.kind(), MediaKind::Youtube, "{}", form);
        assert_eq!(
            reference.playable_url(),
            "https://www.youtube.com/embed/dQw4w9WgXcQ?rel=0&autoplay=1&playsinline=1"
        );
    }
}

#[test]
fn test_hls_passthrough_with_query() {
    let raw = "https://cdn.example.com/live/master.m3u8?token=abc";
    let reference = classify(raw);
    assert_eq!(reference.kind(), MediaKind::Hls);
    assert_eq!(reference.playable_url(), raw);
}

#[test]
fn test_classification_is_total() {
    for raw in ["", "   ", "not a url", "javascript:alert(1)", "https://", "\u{0}\u{1}", "ftp://x/y.mp4"] {
        let reference = classify(raw);
        assert!(
            matches!(reference.kind(), MediaKind::Generic | MediaKind::Unknown),
            "{:?} -> {:?}",
            raw,
            reference.kind()
        );
    }
}

// =============================================================================
// Player Host Tests
// =============================================================================

#[tokio::test]
async fn test_preferences_applied_before_first_autoplay() {
    let factory = FakeFactory {
        block_autoplay: true,
        metadata_on_attach: Some(30.0),
        ..FakeFactory::default()
    };
    let probe = factory.probe.clone();
    let prefs = Preferences {
        volume: 0.4,
        muted: false,
        playback_rate: 1.5,
        ..Preferences::default()
    };
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), prefs);

    player.present("https://cdn.example.com/show/master.m3u8");
    assert_eq!(player.next_signal().await, PlayerSignal::ManualPlayNeeded);

    assert_eq!(
        probe.calls(),
        vec![
            "volume 0.4",
            "muted false",
            "rate 1.5",
            "attach https://cdn.example.com/show/master.m3u8",
            "play"
        ]
    );
    assert!(player.view().playback.manual_play_needed);
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_watchdog_fires_after_eight_seconds() {
    let factory = FakeFactory {
        metadata_on_attach: Some(30.0),
        ..FakeFactory::default()
    };
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());
    player.present("https://cdn.example.com/clip.mp4");

    let start = tokio::time::Instant::now();
    assert_eq!(player.next_signal().await, PlayerSignal::ManualPlayNeeded);
    assert!(start.elapsed() >= Duration::from_secs(8));
}

#[tokio::test]
async fn test_at_most_one_live_backend_across_switches() {
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());

    player.present("https://cdn.example.com/a.m3u8");
    assert_eq!(probe.live(), 1);
    player.present("https://youtu.be/dQw4w9WgXcQ");
    assert_eq!(player.surface_kind(), SurfaceKind::Youtube);
    assert_eq!(probe.live(), 0);
    player.present("https://cdn.example.com/b.mp4");
    player.present("https://cdn.example.com/c.webm");
    assert_eq!(probe.live(), 1);
    player.present("hello world");
    assert_eq!(probe.live(), 0);
    assert_eq!(player.surface_kind(), SurfaceKind::NotPlayable);

    assert_eq!(probe.max_live.load(Ordering::SeqCst), 1);
    assert!(probe.calls().contains(&"yt destroy".to_string()));
}

#[tokio::test]
async fn test_not_playable_notice() {
    let mut player = player_with(FakeFactory::default(), ScriptedResolver::new(vec![]), Preferences::default());
    player.present("just some text");
    assert!(matches!(player.next_signal().await, PlayerSignal::NotPlayable { .. }));
    assert!(player.view().notice.is_some());
}

#[tokio::test]
async fn test_streamtape_resolves_to_native() {
    let direct = "https://streamtape.com/get_video?id=AbC123xyz&token=t".to_string();
    let resolver = ScriptedResolver::new(vec![(Duration::ZERO, Ok(direct.clone()))]);
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, resolver, Preferences::default());

    player.present(STREAMTAPE);
    assert_eq!(player.surface_kind(), SurfaceKind::Resolving);
    assert_eq!(player.next_signal().await, PlayerSignal::Resolved { url: direct.clone() });
    assert_eq!(player.surface_kind(), SurfaceKind::Native);
    assert!(probe.calls().contains(&format!("attach {}", direct)));
}

#[tokio::test]
async fn test_streamtape_failure_falls_back_to_embed() {
    let resolver = ScriptedResolver::new(vec![(Duration::ZERO, Err(Error::ResolutionParseFailure))]);
    let mut player = player_with(FakeFactory::default(), resolver, Preferences::default());

    player.present(STREAMTAPE);
    match player.next_signal().await {
        PlayerSignal::FallbackEmbed { embed_url, .. } => {
            assert_eq!(embed_url, "https://streamtape.com/e/AbC123xyz/");
        }
        other => panic!("unexpected signal {:?}", other),
    }
    assert_eq!(player.surface_kind(), SurfaceKind::Iframe);
    assert_eq!(
        player.iframe_mut().unwrap().embed_url(),
        "https://streamtape.com/e/AbC123xyz/"
    );
}

#[tokio::test(start_paused = true)]
async fn test_streamtape_timeout_falls_back_to_embed() {
    let resolver = ScriptedResolver::new(vec![(Duration::from_secs(60), Ok("https://late".into()))]);
    let mut player = player_with(FakeFactory::default(), resolver, Preferences::default());

    player.present(STREAMTAPE);
    let start = tokio::time::Instant::now();
    match player.next_signal().await {
        PlayerSignal::FallbackEmbed { reason, .. } => assert!(reason.contains("timed out"), "{}", reason),
        other => panic!("unexpected signal {:?}", other),
    }
    assert!(start.elapsed() >= Duration::from_secs(12));
    assert!(start.elapsed() < Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_retry_resolution_supersedes_in_flight_request() {
    let resolver = ScriptedResolver::new(vec![
        (Duration::from_secs(10), Ok("https://stale".into())),
        (Duration::from_secs(1), Ok("https://fresh".into())),
    ]);
    let mut player = player_with(FakeFactory::default(), resolver.clone(), Preferences::default());

    player.present(STREAMTAPE);
    while resolver.calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }
    assert!(player.retry_resolution());

    assert_eq!(
        player.next_signal().await,
        PlayerSignal::Resolved {
            url: "https://fresh".into()
        }
    );
    assert_eq!(player.view().surface, SurfaceKind::Native);
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_use_embed_now_skips_resolution() {
    let resolver = ScriptedResolver::new(vec![(Duration::from_secs(5), Ok("https://late".into()))]);
    let mut player = player_with(FakeFactory::default(), resolver, Preferences::default());

    player.present(STREAMTAPE);
    assert!(player.use_embed_now());
    assert!(matches!(player.next_signal().await, PlayerSignal::FallbackEmbed { .. }));
    assert_eq!(player.surface_kind(), SurfaceKind::Iframe);
    assert!(!player.use_embed_now());
}

#[tokio::test]
async fn test_quality_levels_through_host() {
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());
    player.present("https://cdn.example.com/master.m3u8");

    probe.emit(MediaEvent::ManifestParsed {
        levels: vec![
            QualityLevel::new(0, Some(360)),
            QualityLevel::new(1, Some(720)),
            QualityLevel::new(2, Some(1080)),
        ],
    });
    probe.emit(MediaEvent::Playing);
    probe.emit(MediaEvent::Ended);
    assert_eq!(player.next_signal().await, PlayerSignal::Ended);

    let engine = player.engine_mut().unwrap();
    assert_eq!(
        engine.quality_options(),
        vec![
            QualityChoice::Auto,
            QualityChoice::Level(0),
            QualityChoice::Level(1),
            QualityChoice::Level(2)
        ]
    );
    assert!(engine.set_quality(QualityChoice::Level(3)).is_err());
    assert_eq!(engine.state().quality_level, QualityChoice::Auto);
    assert_ok!(engine.set_quality(QualityChoice::Level(2)));
}

#[tokio::test]
async fn test_fatal_error_then_retry() {
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());
    player.present("https://cdn.example.com/master.m3u8");

    probe.emit(MediaEvent::HlsError {
        fatal: true,
        details: "manifestLoadError".into(),
    });
    assert!(matches!(player.next_signal().await, PlayerSignal::Error { .. }));
    assert_eq!(player.view().playback.phase, PlaybackPhase::Error);
    assert_eq!(probe.live(), 0);

    let before = player.generation();
    player.retry();
    assert_eq!(player.generation(), before + 1);
    assert_eq!(player.view().playback.phase, PlaybackPhase::Loading);
    assert_eq!(probe.live(), 1);
}

// =============================================================================
// Playlist Tests
// =============================================================================

#[tokio::test]
async fn test_playlist_advances_once_per_end() {
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());

    let context = PlaylistContext::from_json(
        r#"{"list": ["https://cdn.example.com/one.mp4", "https://cdn.example.com/two.mp4"], "currentIndex": 0}"#,
    )
    .unwrap();
    assert!(player.load_playlist(context));
    let first_generation = player.generation();

    probe.emit(MediaEvent::Playing);
    probe.emit(MediaEvent::Ended);
    probe.emit(MediaEvent::Ended);

    assert_eq!(player.next_signal().await, PlayerSignal::Ended);
    assert_eq!(player.generation(), first_generation + 1);
    assert_eq!(player.playlist().unwrap().current_index(), 1);
    assert_eq!(
        player.current().unwrap().playable_url(),
        "https://cdn.example.com/two.mp4"
    );
    assert_eq!(probe.live(), 1);

    // The duplicate end belongs to the old generation and is dropped
    let extra = tokio::time::timeout(Duration::from_millis(50), player.next_signal()).await;
    assert!(extra.is_err());
    assert_eq!(player.playlist().unwrap().current_index(), 1);
}

#[tokio::test]
async fn test_youtube_end_advances_playlist() {
    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());

    let context = PlaylistContext::from_json(
        r#"{"list": ["https://youtu.be/dQw4w9WgXcQ", "https://cdn.example.com/two.mp4"], "currentIndex": 0}"#,
    )
    .unwrap();
    assert!(player.load_playlist(context));
    assert_eq!(player.surface_kind(), SurfaceKind::Youtube);

    assert!(player.on_youtube_ready());
    assert!(player.on_youtube_state(1));
    assert!(player.on_youtube_state(0));

    let signal = tokio::time::timeout(Duration::from_millis(500), player.next_signal()).await;
    assert_eq!(signal.unwrap(), PlayerSignal::Ended);
    assert_eq!(player.playlist().unwrap().current_index(), 1);
    assert_eq!(player.surface_kind(), SurfaceKind::Native);
    assert!(probe.calls().contains(&"yt destroy".to_string()));
    assert!(!player.on_youtube_state(0));
}

#[tokio::test]
async fn test_directly_driven_youtube_adapter_reports_end() {
    let mut player = player_with(
        FakeFactory::default(),
        ScriptedResolver::new(vec![]),
        Preferences::default(),
    );
    let context = PlaylistContext::from_json(
        r#"{"list": ["https://youtu.be/dQw4w9WgXcQ", "https://cdn.example.com/two.mp4"], "currentIndex": 0}"#,
    )
    .unwrap();
    assert!(player.load_playlist(context));

    let adapter = player.youtube_mut().unwrap();
    adapter.on_ready();
    adapter.on_state_change(1);
    adapter.on_state_change(0);

    let signal = tokio::time::timeout(Duration::from_millis(500), player.next_signal()).await;
    assert_eq!(signal.unwrap(), PlayerSignal::Ended);
    assert_eq!(player.playlist().unwrap().current_index(), 1);
}

#[tokio::test]
async fn test_youtube_error_reaches_host() {
    let mut player = player_with(
        FakeFactory::default(),
        ScriptedResolver::new(vec![]),
        Preferences::default(),
    );
    let mut view = player.subscribe();
    player.present("https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    assert!(player.on_youtube_ready());
    assert!(player.on_youtube_error(100));

    let signal = tokio::time::timeout(Duration::from_millis(500), player.next_signal()).await;
    assert!(matches!(signal.unwrap(), PlayerSignal::Error { .. }));
    assert!(view.has_changed().unwrap());
    assert_eq!(view.borrow_and_update().playback.phase, PlaybackPhase::Error);
}

#[tokio::test]
async fn test_embed_error_reaches_host() {
    let mut player = player_with(
        FakeFactory::default(),
        ScriptedResolver::new(vec![]),
        Preferences::default(),
    );
    player.present("https://rumble.com/v4abcd-some-title.html");
    assert_eq!(player.surface_kind(), SurfaceKind::Iframe);

    let iframe = player.reveal_embed().unwrap();
    assert_eq!(iframe.src, "https://rumble.com/embed/v4abcd/?autoplay=2");
    assert!(player.on_embed_error("Embed blocked"));

    let signal = tokio::time::timeout(Duration::from_millis(500), player.next_signal()).await;
    assert_eq!(
        signal.unwrap(),
        PlayerSignal::Error {
            message: "Embed blocked".into()
        }
    );
    assert_eq!(
        player.view().playback.error_message.as_deref(),
        Some("Embed blocked")
    );

    // Same path when the host drives the adapter itself
    player.present("https://rumble.com/v4abcd-some-title.html");
    let adapter = player.iframe_mut().unwrap();
    adapter.reveal();
    adapter.on_error("Refused to connect");
    let signal = tokio::time::timeout(Duration::from_millis(500), player.next_signal()).await;
    assert!(matches!(signal.unwrap(), PlayerSignal::Error { .. }));
}

#[tokio::test]
async fn test_mute_key_reaches_youtube() {
    use vidgate_core::{ControlAction, Key, KeyInput};

    let factory = FakeFactory::default();
    let probe = factory.probe.clone();
    let mut player = player_with(factory, ScriptedResolver::new(vec![]), Preferences::default());
    player.present("https://youtu.be/dQw4w9WgXcQ");
    assert!(player.on_youtube_ready());

    assert_eq!(
        player.handle_key(KeyInput::new(Key::Char('m'))),
        Some(ControlAction::ToggleMute)
    );
    assert!(player.view().playback.muted);
    assert!(probe.calls().contains(&"yt mute".to_string()));

    // Fullscreen belongs to the host container for embeds
    assert_eq!(player.handle_key(KeyInput::new(Key::Char('f'))), None);
}

// =============================================================================
// Resolver Tests
// =============================================================================

#[tokio::test]
async fn test_resolver_rejects_foreign_host_without_fetching() {
    use vidgate_core::{PageFetcher, StreamtapeResolver};

    struct CountingFetcher(AtomicUsize);

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch_page(&self, _url: &url::Url) -> Result<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(String::new())
        }
    }

    let fetcher = Arc::new(CountingFetcher(AtomicUsize::new(0)));
    let resolver = StreamtapeResolver::new(fetcher.clone());
    for url in ["https://evil.example/v/abc", "https://streamtape.com.evil.example/v/abc", "file:///etc/passwd"] {
        assert!(matches!(
            resolver.resolve(url).await,
            Err(Error::DisallowedHost(_))
        ));
    }
    assert_eq!(fetcher.0.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Handoff Tests
// =============================================================================

#[test]
fn test_handoff_respects_configured_ttl() {
    use chrono::{TimeDelta, Utc};
    use vidgate_core::{HandoffMessage, HandoffQueue};

    let config = PlayerConfig::default();
    let now = Utc::now();
    let mut queue = HandoffQueue::new(config.handoff_ttl());
    queue.push(HandoffMessage::new("https://youtu.be/dQw4w9WgXcQ", now - TimeDelta::minutes(45)));
    queue.push(HandoffMessage::new("https://cdn.example.com/fresh.m3u8", now - TimeDelta::minutes(29)));
    assert_eq!(queue.len(), 2);

    let message = queue.take(now).unwrap();
    assert_eq!(classify(&message.url).kind(), MediaKind::Hls);
    assert!(queue.is_empty());
}
