//! Headless backend
//!
//! Stands in for a media element where there is no display: HLS sources are
//! probed with the manifest client, progressive sources with a HEAD request.
//! Playback itself is simulated so the engine's state machine, watchdogs and
//! preferences behave exactly as they would in a browser.

use super::{EventSink, MediaBackend, MediaEvent, NativeFormat, NativeSource};
use crate::{error::Error, manifest::HlsManifestClient, types::QualityLevel, Result};
use reqwest::Client;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use url::Url;

struct Attached {
    sink: EventSink,
    probe: JoinHandle<()>,
}

/// Backend without a display surface
pub struct HeadlessBackend {
    client: Client,
    manifests: HlsManifestClient,
    attached: Option<Attached>,
    levels: Arc<Mutex<Vec<QualityLevel>>>,
    autoplay_allowed: bool,
    volume: f64,
    muted: bool,
    rate: f64,
    level: Option<usize>,
    position: f64,
    playing: bool,
}

impl HeadlessBackend {
    pub fn new(client: Client, manifests: HlsManifestClient) -> Self {
        Self {
            client,
            manifests,
            attached: None,
            levels: Arc::new(Mutex::new(Vec::new())),
            autoplay_allowed: true,
            volume: 1.0,
            muted: false,
            rate: 1.0,
            level: None,
            position: 0.0,
            playing: false,
        }
    }

    /// Reject the first `play()` like a browser without a user gesture;
    /// later calls count as gestures and succeed
    pub fn with_autoplay_blocked(mut self) -> Self {
        self.autoplay_allowed = false;
        self
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    pub fn playback_rate(&self) -> f64 {
        self.rate
    }

    pub fn level(&self) -> Option<usize> {
        self.level
    }

    fn emit(&self, event: MediaEvent) {
        if let Some(attached) = &self.attached {
            attached.sink.emit(event);
        }
    }

    fn spawn_probe(&self, source: &NativeSource, sink: EventSink) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::InvalidConfig("headless backend requires a tokio runtime".into()))?;
        let url = Url::parse(&source.url)
            .map_err(|e| Error::MediaElement(format!("invalid source url: {}", e)))?;

        let handle = match source.format {
            NativeFormat::Hls => {
                let manifests = self.manifests.clone();
                let levels = Arc::clone(&self.levels);
                runtime.spawn(async move {
                    match manifests.load(&url).await {
                        Ok(manifest) => {
                            *levels.lock().unwrap_or_else(PoisonError::into_inner) =
                                manifest.levels.clone();
                            sink.emit(MediaEvent::ManifestParsed {
                                levels: manifest.levels,
                            });
                            sink.emit(MediaEvent::LoadedMetadata {
                                duration: manifest.duration.unwrap_or(0.0),
                            });
                            sink.emit(MediaEvent::CanPlay);
                        }
                        Err(e) => {
                            sink.emit(MediaEvent::HlsError {
                                fatal: true,
                                details: e.to_string(),
                            });
                        }
                    }
                })
            }
            NativeFormat::Progressive => {
                let client = self.client.clone();
                runtime.spawn(async move {
                    match client.head(url).send().await {
                        Ok(response) if response.status().is_success() => {
                            debug!(
                                content_type = ?response.headers().get(reqwest::header::CONTENT_TYPE),
                                "Progressive source reachable"
                            );
                            sink.emit(MediaEvent::LoadedMetadata { duration: 0.0 });
                            sink.emit(MediaEvent::CanPlay);
                        }
                        Ok(response) => {
                            sink.emit(MediaEvent::Error {
                                message: format!("source returned HTTP {}", response.status()),
                            });
                        }
                        Err(e) => {
                            sink.emit(MediaEvent::Error {
                                message: e.to_string(),
                            });
                        }
                    }
                })
            }
        };
        Ok(handle)
    }
}

impl MediaBackend for HeadlessBackend {
    fn attach(&mut self, source: &NativeSource, events: EventSink) -> Result<()> {
        self.detach();
        let probe = self.spawn_probe(source, events.clone())?;
        debug!(url = %source.url, format = ?source.format, "Headless backend attached");
        self.attached = Some(Attached {
            sink: events,
            probe,
        });
        Ok(())
    }

    fn detach(&mut self) {
        if let Some(attached) = self.attached.take() {
            attached.probe.abort();
            debug!(generation = attached.sink.generation(), "Headless backend detached");
        }
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.playing = false;
        self.position = 0.0;
    }

    fn is_attached(&self) -> bool {
        self.attached.is_some()
    }

    fn enumerate_levels(&self) -> Vec<QualityLevel> {
        self.levels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn play(&mut self) -> Result<()> {
        if self.attached.is_none() {
            return Err(Error::NotAttached);
        }
        if !self.autoplay_allowed {
            self.autoplay_allowed = true;
            return Err(Error::AutoplayBlocked);
        }
        self.playing = true;
        self.emit(MediaEvent::Play);
        self.emit(MediaEvent::Playing);
        Ok(())
    }

    fn pause(&mut self) {
        if self.playing {
            self.playing = false;
            self.emit(MediaEvent::Pause);
        }
    }

    fn seek(&mut self, time: f64) {
        self.position = time;
        self.emit(MediaEvent::TimeUpdate { current_time: time });
    }

    fn set_volume(&mut self, volume: f64) {
        self.volume = volume;
    }

    fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    fn set_playback_rate(&mut self, rate: f64) {
        self.rate = rate;
    }

    fn set_level(&mut self, level: Option<usize>) {
        self.level = level;
        if let Some(index) = level {
            self.emit(MediaEvent::LevelSwitched { index });
        }
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()> {
        if fullscreen {
            warn!("Fullscreen is not available without a display");
            return Err(Error::UnsupportedFormat("fullscreen without a display".into()));
        }
        Ok(())
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PlayerConfig;

    fn backend() -> HeadlessBackend {
        let config = PlayerConfig::default();
        HeadlessBackend::new(Client::new(), HlsManifestClient::new(&config).unwrap())
    }

    #[tokio::test]
    async fn test_play_requires_attach() {
        let mut backend = backend();
        assert!(matches!(backend.play(), Err(Error::NotAttached)));
    }

    #[tokio::test]
    async fn test_blocked_autoplay() {
        let mut backend = backend().with_autoplay_blocked();
        let (sink, _rx) = EventSink::channel(1);
        backend
            .attach(&NativeSource::progressive("http://127.0.0.1:9/clip.mp4"), sink)
            .unwrap();
        assert!(matches!(backend.play(), Err(Error::AutoplayBlocked)));
        assert!(backend.play().is_ok());
        backend.detach();
        assert!(!backend.is_attached());
    }

    #[test]
    fn test_attach_outside_runtime_fails() {
        let mut backend = backend();
        let (sink, _rx) = EventSink::channel(1);
        let result = backend.attach(&NativeSource::hls("https://cdn.example.com/a.m3u8"), sink);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
        assert!(!backend.is_attached());
    }

    #[test]
    fn test_properties_held_before_attach() {
        let mut backend = backend();
        backend.set_volume(0.3);
        backend.set_muted(true);
        backend.set_playback_rate(1.5);
        assert_eq!(backend.volume(), 0.3);
        assert!(backend.muted());
        assert_eq!(backend.playback_rate(), 1.5);
    }
}
