//! Streaming manifest inspection
//!
//! Used by hosts without a browser decoder to learn what an HLS source offers
//! (quality levels, duration, live or VOD) before playback starts.

mod hls;

pub use hls::{parse_manifest, HlsManifest, HlsManifestClient};
