//! Vidgate Core - video source resolution and adaptive playback
//!
//! This crate provides:
//! - URL classification into typed media references
//! - Streamtape direct-link resolution
//! - A native playback engine for mp4 and HLS sources
//! - Embed adapters for YouTube, Facebook, Rumble and Odysee
//! - Persisted playback preferences
//! - Playlist driving and source handoff
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Vidgate Core                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │  Classifier  │  │   Playlist   │  │   Handoff    │           │
//! │  │  (rule table)│  │    Driver    │  │    Queue     │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         └─────────────────┼─────────────────┘                   │
//! │                    ┌──────┴──────┐      ┌──────────────┐        │
//! │                    │   Player    │◄─────┤  Streamtape  │        │
//! │                    │    Host     │      │   Resolver   │        │
//! │                    └──────┬──────┘      └──────────────┘        │
//! │         ┌─────────────────┼─────────────────┐                   │
//! │  ┌──────┴───────┐  ┌──────┴──────┐  ┌───────┴──────┐            │
//! │  │   Playback   │  │   YouTube   │  │    Iframe    │            │
//! │  │    Engine    │  │   Adapter   │  │   Adapter    │            │
//! │  └──────┬───────┘  └─────────────┘  └──────────────┘            │
//! │  ┌──────┴───────┐  ┌──────────────┐                             │
//! │  │ MediaBackend │  │ Preference   │                             │
//! │  │  (injected)  │  │    Store     │                             │
//! │  └──────────────┘  └──────────────┘                             │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod classify;
pub mod controls;
pub mod embed;
pub mod engine;
pub mod error;
pub mod handoff;
pub mod manifest;
pub mod player;
pub mod playlist;
pub mod preferences;
pub mod resolver;
pub mod surface;
pub mod types;
pub mod watchdog;

pub use backend::{EventSink, HeadlessBackend, MediaBackend, MediaEvent, NativeSource};
pub use classify::classify;
pub use controls::{ControlAction, Key, KeyInput};
pub use embed::{EmbedProvider, IframeAdapter, IframePhase, IframeSpec, YouTubeAdapter, YouTubePlayerApi};
pub use engine::PlaybackEngine;
pub use error::{Error, Result};
pub use handoff::{HandoffMessage, HandoffQueue};
pub use manifest::{HlsManifest, HlsManifestClient};
pub use player::{HeadlessSurfaces, Player, PlayerView, SurfaceFactory, SurfaceKind};
pub use playlist::{PlaylistContext, PlaylistDriver, PlaylistItem};
pub use preferences::{
    HlsQualityPreference, JsonFilePreferenceStore, MemoryPreferenceStore, PreferenceStore, Preferences,
    PreferencesPatch,
};
pub use resolver::{
    extract_direct_link, validate_streamtape_url, HttpPageFetcher, HttpResolverClient, PageFetcher,
    ResolveStreamtape, StreamtapeResolver,
};
pub use surface::{PlaybackSurface, PlayerSignal};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the library
pub fn init() {
    tracing::info!(version = VERSION, "Vidgate Core initialized");
}
