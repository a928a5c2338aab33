//! CLI command implementations

use crate::output::{print_rows, to_json, OutputFormat};
use anyhow::Context;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tabled::Tabled;
use tracing::debug;
use url::Url;
use vidgate_core::{
    classify as classify_url, HandoffMessage, HandoffQueue, HeadlessSurfaces, HlsManifestClient, HlsQualityPreference,
    HttpResolverClient, JsonFilePreferenceStore, MemoryPreferenceStore, Player, PlayerConfig,
    PlayerSignal, PlaylistContext, PlaylistDriver, PreferenceStore, PreferencesPatch,
    ResolveStreamtape, StreamtapeResolver, SurfaceKind,
};

/// Load the player config file, if any, and apply the endpoint override
pub fn load_config(path: Option<&Path>, endpoint: Option<&str>) -> anyhow::Result<PlayerConfig> {
    let mut config = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            serde_json::from_str::<PlayerConfig>(&content)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => PlayerConfig::default(),
    };
    if let Some(endpoint) = endpoint {
        config.resolver_endpoint = endpoint.to_string();
    }
    config.validate()?;
    Ok(config)
}

fn resolver(config: &PlayerConfig, remote: bool) -> anyhow::Result<Arc<dyn ResolveStreamtape>> {
    if remote {
        debug!(endpoint = %config.resolver_endpoint, "Using resolver server");
        Ok(Arc::new(HttpResolverClient::new(config)?))
    } else {
        Ok(Arc::new(StreamtapeResolver::from_config(config)?))
    }
}

// ============================================================================
// classify
// ============================================================================

#[derive(Debug, Serialize, Tabled)]
struct ClassifyRow {
    input: String,
    kind: String,
    playable: String,
}

/// Classify links
pub fn classify(urls: &[String], format: OutputFormat) {
    let rows: Vec<ClassifyRow> = urls
        .iter()
        .map(|raw| {
            let reference = classify_url(raw);
            ClassifyRow {
                input: raw.clone(),
                kind: reference.kind().to_string(),
                playable: reference.playable_url().to_string(),
            }
        })
        .collect();

    print_rows(rows, format, |row| {
        format!("{:<10} {}", style(&row.kind).cyan(), row.playable)
    });
}

// ============================================================================
// resolve
// ============================================================================

#[derive(Debug, Serialize)]
struct ResolveReport {
    input: String,
    url: Option<String>,
    error: Option<String>,
    code: Option<String>,
    embed_url: Option<String>,
}

/// Resolve a Streamtape link, reporting the embed fallback on failure
pub async fn resolve(
    raw_url: &str,
    config: &PlayerConfig,
    remote: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let resolver = resolver(config, remote)?;
    let result = tokio::time::timeout(config.resolver_timeout(), resolver.resolve(raw_url))
        .await
        .unwrap_or(Err(vidgate_core::Error::ResolutionTimeout(config.resolver_timeout())));

    let embed_url = classify_url(raw_url).streamtape_embed_url();
    let report = match &result {
        Ok(url) => ResolveReport {
            input: raw_url.to_string(),
            url: Some(url.clone()),
            error: None,
            code: None,
            embed_url,
        },
        Err(e) => ResolveReport {
            input: raw_url.to_string(),
            url: None,
            error: Some(e.to_string()),
            code: Some(e.error_code().to_string()),
            embed_url,
        },
    };

    match format {
        OutputFormat::Json => println!("{}", to_json(&report)),
        OutputFormat::Text | OutputFormat::Table => match (&report.url, &report.error) {
            (Some(url), _) => println!("{} {}", style("resolved").green(), url),
            (None, Some(error)) => {
                println!("{} {}", style("failed").red(), error);
                if let Some(embed) = &report.embed_url {
                    println!("{} {}", style("embed").yellow(), embed);
                }
            }
            (None, None) => {}
        },
    }

    result.map(|_| ()).map_err(Into::into)
}

// ============================================================================
// levels
// ============================================================================

#[derive(Debug, Serialize, Tabled)]
struct LevelRow {
    index: usize,
    label: String,
    #[tabled(display_with = "display_bitrate")]
    bitrate: Option<u64>,
}

fn display_bitrate(bitrate: &Option<u64>) -> String {
    match bitrate {
        Some(bps) => format!("{} kbps", bps / 1000),
        None => "-".to_string(),
    }
}

/// List HLS quality levels
pub async fn levels(manifest_url: &str, config: &PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let url = Url::parse(manifest_url)?;
    let manifest = HlsManifestClient::new(config)?.load(&url).await?;

    if format == OutputFormat::Text {
        println!("Manifest: {}", manifest_url);
        println!("  Live: {}", manifest.is_live);
        match manifest.duration {
            Some(duration) => println!("  Duration: {:.1}s", duration),
            None => println!("  Duration: unknown"),
        }
        println!("  Quality options: auto + {}", manifest.levels.len());
    }

    let rows: Vec<LevelRow> = manifest
        .levels
        .iter()
        .map(|level| LevelRow {
            index: level.index,
            label: level.label(),
            bitrate: level.bitrate,
        })
        .collect();

    print_rows(rows, format, |row| {
        format!("  {}. {} ({})", row.index, row.label, display_bitrate(&row.bitrate))
    });
    Ok(())
}

// ============================================================================
// play
// ============================================================================

pub struct PlayOptions {
    pub seconds: u64,
    pub block_autoplay: bool,
    pub gesture: bool,
    pub prefs: Option<PathBuf>,
    pub remote: bool,
}

fn preference_store(path: Option<&Path>) -> Arc<dyn PreferenceStore> {
    match path {
        Some(path) => Arc::new(JsonFilePreferenceStore::new(path)),
        None => Arc::new(MemoryPreferenceStore::new()),
    }
}

fn report_signal(signal: &PlayerSignal, format: OutputFormat) {
    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string(signal).unwrap_or_default());
        return;
    }
    match signal {
        PlayerSignal::Ended => println!("{}", style("ended").cyan()),
        PlayerSignal::Error { message } => println!("{} {}", style("error").red(), message),
        PlayerSignal::ManualPlayNeeded => println!("{}", style("manual play needed").yellow()),
        PlayerSignal::Resolved { url } => println!("{} {}", style("resolved").green(), url),
        PlayerSignal::FallbackEmbed { embed_url, reason } => {
            println!("{} {} ({})", style("embed").yellow(), embed_url, reason)
        }
        PlayerSignal::NotPlayable { message } => println!("{} {}", style("not playable").red(), message),
    }
}

/// Surfaces that will never raise another signal in a headless host
fn settled(kind: SurfaceKind) -> bool {
    matches!(kind, SurfaceKind::Iframe | SurfaceKind::NotPlayable | SurfaceKind::Empty)
}

/// Play a link headlessly until it settles or time runs out
pub async fn play(
    raw_url: &str,
    config: &PlayerConfig,
    options: PlayOptions,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let surfaces = HeadlessSurfaces::new(config)?.with_autoplay_blocked(options.block_autoplay);
    let mut player = Player::new(
        config.clone(),
        surfaces,
        resolver(config, options.remote)?,
        preference_store(options.prefs.as_deref()),
    );
    player.present(raw_url);

    let deadline = tokio::time::Instant::now() + Duration::from_secs(options.seconds);
    loop {
        let signal = match tokio::time::timeout_at(deadline, player.next_signal()).await {
            Ok(signal) => signal,
            Err(_) => break,
        };
        report_signal(&signal, format);

        match signal {
            PlayerSignal::ManualPlayNeeded if options.gesture => {
                if let Some(surface) = player.surface_mut() {
                    surface.toggle_play(std::time::Instant::now());
                }
            }
            PlayerSignal::Ended | PlayerSignal::Error { .. } | PlayerSignal::NotPlayable { .. } => break,
            _ => {}
        }
        if settled(player.surface_kind()) {
            break;
        }
    }

    let view = player.view();
    match format {
        OutputFormat::Json => println!("{}", to_json(&view)),
        OutputFormat::Text | OutputFormat::Table => {
            println!(
                "surface={:?} phase={} playing={} volume={:.2} rate={:.2} quality={}",
                view.surface,
                view.playback.phase,
                view.playback.playing,
                view.playback.volume,
                view.playback.playback_rate,
                serde_json::to_string(&view.playback.quality_level).unwrap_or_default()
            );
        }
    }
    player.teardown();
    Ok(())
}

// ============================================================================
// playlist
// ============================================================================

#[derive(Debug, Serialize, Tabled)]
struct PlaylistRow {
    index: usize,
    current: bool,
    kind: String,
    playable: String,
}

/// Show a playlist, optionally mounting each entry
pub async fn playlist(
    file: &Path,
    walk: bool,
    config: &PlayerConfig,
    remote: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let context = PlaylistContext::from_json(&content)?;
    let driver = PlaylistDriver::new(context.clone());

    let rows: Vec<PlaylistRow> = context
        .list
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let reference = classify_url(item.raw_url());
            PlaylistRow {
                index,
                current: index == driver.current_index(),
                kind: reference.kind().to_string(),
                playable: reference.playable_url().to_string(),
            }
        })
        .collect();
    print_rows(rows, format, |row| {
        let marker = if row.current { ">" } else { " " };
        format!("{} {:>2} {:<10} {}", marker, row.index, row.kind, row.playable)
    });

    if !walk {
        return Ok(());
    }

    let surfaces = HeadlessSurfaces::new(config)?;
    let mut player = Player::new(
        config.clone(),
        surfaces,
        resolver(config, remote)?,
        Arc::new(MemoryPreferenceStore::new()),
    );
    if !player.load_playlist(context) {
        println!("{}", style("playlist is empty").yellow());
        return Ok(());
    }
    loop {
        let index = player.playlist().map(PlaylistDriver::current_index).unwrap_or_default();
        println!("[{}] surface={:?}", index, player.surface_kind());
        if !player.playlist_next() {
            break;
        }
    }
    player.teardown();
    Ok(())
}

// ============================================================================
// handoff
// ============================================================================

/// Take a handoff message through the TTL queue and classify its link
pub fn handoff(message: &str, config: &PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let message: HandoffMessage = serde_json::from_str(message).context("parsing handoff message")?;
    let mut queue = HandoffQueue::new(config.handoff_ttl());
    queue.push(message);

    let Some(fresh) = queue.take(chrono::Utc::now()) else {
        println!("{}", style("handoff expired").yellow());
        return Ok(());
    };
    classify(&[fresh.url], format);
    Ok(())
}

// ============================================================================
// prefs
// ============================================================================

/// Show or update the preference file
pub fn prefs(
    path: &Path,
    volume: Option<f64>,
    muted: Option<bool>,
    rate: Option<f64>,
    quality: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let store = JsonFilePreferenceStore::new(path);
    let patch = PreferencesPatch {
        volume,
        muted,
        playback_rate: rate,
        hls_quality: quality.map(str::parse::<HlsQualityPreference>).transpose()?,
    };
    if patch != PreferencesPatch::default() {
        store.save(patch)?;
    }

    let current = store.load().unwrap_or_default();
    match format {
        OutputFormat::Json => println!("{}", to_json(&current)),
        OutputFormat::Text | OutputFormat::Table => {
            println!("Preferences ({})", path.display());
            println!("  volume: {:.2}", current.volume);
            println!("  muted: {}", current.muted);
            println!("  rate: {:.2}", current.playback_rate);
            println!("  quality: {}", current.hls_quality);
        }
    }
    Ok(())
}
