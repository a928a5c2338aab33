//! Media backends
//!
//! A [`MediaBackend`] is the native media element (or HLS decoder bound to
//! one). The playback engine commands it synchronously; the backend reports
//! what actually happened through an [`EventSink`], the same way a media
//! element fires DOM events. Every sink is stamped with the mount generation
//! so events from a torn-down backend can be recognised and dropped.

mod headless;

pub use headless::HeadlessBackend;

use crate::{
    error::Error,
    types::{MediaKind, MediaReference, QualityLevel},
    Result,
};
use tokio::sync::mpsc;

/// How a native source is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeFormat {
    /// Direct `src` (MP4/WebM/Ogg)
    Progressive,
    /// HLS decoder bound to the element
    Hls,
}

/// Source handed to a backend on attach
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeSource {
    pub url: String,
    pub format: NativeFormat,
}

impl NativeSource {
    pub fn progressive(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: NativeFormat::Progressive,
        }
    }

    pub fn hls(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            format: NativeFormat::Hls,
        }
    }

    /// Native source for an `mp4`/`hls` reference
    pub fn from_reference(reference: &MediaReference) -> Result<Self> {
        match reference.kind() {
            MediaKind::Mp4 => Ok(Self::progressive(reference.playable_url())),
            MediaKind::Hls => Ok(Self::hls(reference.playable_url())),
            other => Err(Error::UnsupportedFormat(format!(
                "{} sources are not decoded natively",
                other
            ))),
        }
    }

    pub fn is_hls(&self) -> bool {
        self.format == NativeFormat::Hls
    }
}

/// Events reported by a backend
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    DurationChange { duration: f64 },
    /// HLS manifest parsed; levels in decoder order
    ManifestParsed { levels: Vec<QualityLevel> },
    LevelSwitched { index: usize },
    /// Playback was requested and accepted
    Play,
    /// Frames are actually advancing
    Playing,
    Pause,
    Waiting,
    CanPlay,
    TimeUpdate { current_time: f64 },
    Progress { buffered_end: f64 },
    Ended,
    /// Media element error (decode, network, src not supported)
    Error { message: String },
    HlsError { fatal: bool, details: String },
    FullscreenChanged { fullscreen: bool },
}

/// Event tagged with the mount generation that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationEvent {
    pub generation: u64,
    pub event: MediaEvent,
}

/// Sending half handed to a backend on attach
#[derive(Debug, Clone)]
pub struct EventSink {
    generation: u64,
    tx: mpsc::UnboundedSender<GenerationEvent>,
}

impl EventSink {
    pub fn new(generation: u64, tx: mpsc::UnboundedSender<GenerationEvent>) -> Self {
        Self { generation, tx }
    }

    /// Sink connected to a fresh channel, for hosts that own a single mount
    pub fn channel(generation: u64) -> (Self, mpsc::UnboundedReceiver<GenerationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(generation, tx), rx)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Emit an event; returns false once the host has gone away
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx
            .send(GenerationEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Injected media element / decoder
///
/// Property setters may be called before [`attach`](MediaBackend::attach);
/// a backend must hold them and apply them to the element it attaches.
pub trait MediaBackend: Send {
    /// Bind a source. For HLS this creates the decoder instance.
    fn attach(&mut self, source: &NativeSource, events: EventSink) -> Result<()>;

    /// Destroy the decoder, drop listeners and stop any background work.
    /// Must be idempotent.
    fn detach(&mut self);

    fn is_attached(&self) -> bool;

    /// Levels currently known to the decoder (empty for progressive sources)
    fn enumerate_levels(&self) -> Vec<QualityLevel>;

    /// Request playback; `Err(Error::AutoplayBlocked)` when the platform
    /// rejects it without a user gesture
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    fn seek(&mut self, time: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    fn set_playback_rate(&mut self, rate: f64);

    /// `None` selects automatic level switching
    fn set_level(&mut self, level: Option<usize>);

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;

    #[test]
    fn test_native_source_from_reference() {
        let hls = classify("https://cdn.example.com/master.m3u8");
        assert_eq!(NativeSource::from_reference(&hls).unwrap(), NativeSource::hls("https://cdn.example.com/master.m3u8"));

        let yt = classify("https://youtu.be/dQw4w9WgXcQ");
        assert!(matches!(
            NativeSource::from_reference(&yt),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_sink_tags_generation() {
        let (sink, mut rx) = EventSink::channel(7);
        assert!(sink.emit(MediaEvent::Play));
        let received = rx.try_recv().unwrap();
        assert_eq!(received.generation, 7);
        assert_eq!(received.event, MediaEvent::Play);

        drop(rx);
        assert!(!sink.emit(MediaEvent::Pause));
    }
}
