//! HLS (HTTP Live Streaming) manifest probe
//!
//! Handles:
//! - Master playlists (variants become quality levels)
//! - Media playlists (duration from segment sum when the list is closed)
//! - I-frame variants are skipped

use crate::{error::Error, types::QualityLevel, PlayerConfig, Result};
use m3u8_rs::{MasterPlaylist, MediaPlaylist, Playlist};
use reqwest::Client;
use tracing::{debug, instrument};
use url::Url;

/// What a manifest tells us before playback
#[derive(Debug, Clone, PartialEq)]
pub struct HlsManifest {
    /// Levels sorted by bandwidth, indexed in that order
    pub levels: Vec<QualityLevel>,
    /// Total duration in seconds for closed (VOD) playlists
    pub duration: Option<f64>,
    pub is_live: bool,
    /// Media playlist of the lowest level, when the source is a master playlist
    pub first_media_uri: Option<Url>,
}

/// Parse manifest bytes without following variant URIs
pub fn parse_manifest(content: &[u8], base_url: &Url) -> Result<HlsManifest> {
    let playlist = m3u8_rs::parse_playlist_res(content)
        .map_err(|e| Error::ManifestParse(format!("Failed to parse HLS playlist: {:?}", e)))?;

    match playlist {
        Playlist::MasterPlaylist(master) => parse_master(&master, base_url),
        Playlist::MediaPlaylist(media) => Ok(parse_media(&media)),
    }
}

fn parse_master(master: &MasterPlaylist, base_url: &Url) -> Result<HlsManifest> {
    let mut variants: Vec<_> = master.variants.iter().filter(|v| !v.is_i_frame).collect();
    variants.sort_by_key(|v| v.bandwidth);

    let levels = variants
        .iter()
        .enumerate()
        .map(|(index, variant)| QualityLevel {
            index,
            height: variant.resolution.map(|r| r.height as u32),
            bitrate: Some(variant.bandwidth),
        })
        .collect();

    let first_media_uri = variants
        .first()
        .map(|v| resolve_uri(base_url, &v.uri))
        .transpose()?;

    Ok(HlsManifest {
        levels,
        duration: None,
        is_live: false,
        first_media_uri,
    })
}

fn parse_media(media: &MediaPlaylist) -> HlsManifest {
    let duration = media
        .end_list
        .then(|| media.segments.iter().map(|s| f64::from(s.duration)).sum());

    HlsManifest {
        levels: Vec::new(),
        duration,
        is_live: !media.end_list,
        first_media_uri: None,
    }
}

fn resolve_uri(base: &Url, relative: &str) -> Result<Url> {
    base.join(relative)
        .map_err(|e| Error::ManifestParse(format!("Invalid URI '{}': {}", relative, e)))
}

/// Fetches and summarises HLS manifests
#[derive(Debug, Clone)]
pub struct HlsManifestClient {
    client: Client,
}

impl HlsManifestClient {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.resolver_timeout())
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &Url) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::ManifestFetch(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;
        Ok(body.to_vec())
    }

    /// Load a manifest; for master playlists the lowest variant is fetched
    /// too so duration and liveness are known
    #[instrument(skip(self), fields(url = %url))]
    pub async fn load(&self, url: &Url) -> Result<HlsManifest> {
        let content = self.fetch(url).await?;
        let mut manifest = parse_manifest(&content, url)?;

        if let Some(media_uri) = manifest.first_media_uri.clone() {
            let media_content = self.fetch(&media_uri).await?;
            let media = parse_manifest(&media_content, &media_uri)?;
            manifest.duration = media.duration;
            manifest.is_live = media.is_live;
        }

        debug!(
            levels = manifest.levels.len(),
            duration = ?manifest.duration,
            is_live = manifest.is_live,
            "Loaded HLS manifest"
        );
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p.m3u8
#EXT-X-I-FRAME-STREAM-INF:BANDWIDTH=100000,URI=\"iframes.m3u8\"
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p.m3u8
";

    const MEDIA: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
seg1.ts
#EXTINF:4.5,
seg2.ts
#EXT-X-ENDLIST
";

    fn base() -> Url {
        Url::parse("https://cdn.example.com/show/master.m3u8").unwrap()
    }

    #[test]
    fn test_master_levels_sorted_by_bandwidth() {
        let manifest = parse_manifest(MASTER.as_bytes(), &base()).unwrap();
        let heights: Vec<_> = manifest.levels.iter().map(|l| l.height).collect();
        assert_eq!(heights, vec![Some(360), Some(720), Some(1080)]);
        assert_eq!(manifest.levels[2].index, 2);
        assert_eq!(
            manifest.first_media_uri.unwrap().as_str(),
            "https://cdn.example.com/show/360p.m3u8"
        );
    }

    #[test]
    fn test_media_duration() {
        let manifest = parse_manifest(MEDIA.as_bytes(), &base()).unwrap();
        assert!(manifest.levels.is_empty());
        assert!(!manifest.is_live);
        assert!((manifest.duration.unwrap() - 24.5).abs() < 1e-6);
    }

    #[test]
    fn test_live_media_has_no_duration() {
        let live = MEDIA.replace("#EXT-X-ENDLIST\n", "");
        let manifest = parse_manifest(live.as_bytes(), &base()).unwrap();
        assert!(manifest.is_live);
        assert_eq!(manifest.duration, None);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = parse_manifest(b"<html>not a playlist</html>", &base()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse(_)));
    }
}
