//! Vidgate CLI - Headless Video Player
//!
//! Features:
//! - Link classification
//! - Streamtape resolution (in-process or through a resolver server)
//! - HLS quality level inspection
//! - Headless playback with autoplay, watchdog and embed fallback
//! - Playlist inspection and walking
//! - Source handoff messages
//! - Preference file editing

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use output::OutputFormat;

/// Vidgate CLI - video link toolkit
#[derive(Parser)]
#[command(name = "vidgate")]
#[command(version)]
#[command(about = "Classify, resolve and play video links headlessly", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format (text, json, table)
    #[arg(short, long, default_value = "text", global = true)]
    format: String,

    /// Player configuration file (JSON)
    #[arg(short, long, global = true, env = "VIDGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Resolver server endpoint; Streamtape is resolved in-process when unset
    #[arg(short, long, global = true, env = "VIDGATE_RESOLVER_ENDPOINT")]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one or more links
    Classify {
        /// Links to classify
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Resolve a Streamtape share link to its direct media URL
    Resolve {
        /// Streamtape share link
        url: String,
    },

    /// List the quality levels of an HLS manifest
    Levels {
        /// Manifest URL
        manifest: String,
    },

    /// Play a link headlessly and report player signals
    Play {
        /// Link to play
        url: String,

        /// Stop after this many seconds
        #[arg(short, long, default_value = "20")]
        seconds: u64,

        /// Reject the first autoplay attempt, as a browser without a gesture would
        #[arg(long)]
        block_autoplay: bool,

        /// Simulate a user gesture when manual play is needed
        #[arg(long)]
        gesture: bool,

        /// Preference file (in-memory preferences when unset)
        #[arg(long)]
        prefs: Option<PathBuf>,
    },

    /// Inspect a playlist blob
    Playlist {
        /// Playlist JSON file ({list, currentIndex, poster?})
        file: PathBuf,

        /// Mount every entry in turn and report the surface chosen
        #[arg(long)]
        walk: bool,
    },

    /// Accept a handoff message ({"url", "timestamp"}) and classify it if still fresh
    Handoff {
        /// Handoff message JSON
        message: String,
    },

    /// Show or update stored preferences
    Prefs {
        /// Preference file
        #[arg(long, default_value = "vidgate-prefs.json")]
        path: PathBuf,

        /// Volume (0.0 - 1.0)
        #[arg(long)]
        volume: Option<f64>,

        /// Mute state
        #[arg(long)]
        muted: Option<bool>,

        /// Playback rate (0.25 - 3.0)
        #[arg(long)]
        rate: Option<f64>,

        /// HLS quality (auto, 720p or a level index)
        #[arg(long)]
        quality: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    let format = OutputFormat::from(cli.format.as_str());
    let config = commands::load_config(cli.config.as_deref(), cli.endpoint.as_deref())?;
    let remote = cli.endpoint.is_some();

    match cli.command {
        Commands::Classify { urls } => {
            commands::classify(&urls, format);
        }
        Commands::Resolve { url } => {
            commands::resolve(&url, &config, remote, format).await?;
        }
        Commands::Levels { manifest } => {
            commands::levels(&manifest, &config, format).await?;
        }
        Commands::Play {
            url,
            seconds,
            block_autoplay,
            gesture,
            prefs,
        } => {
            let options = commands::PlayOptions {
                seconds,
                block_autoplay,
                gesture,
                prefs,
                remote,
            };
            commands::play(&url, &config, options, format).await?;
        }
        Commands::Playlist { file, walk } => {
            commands::playlist(&file, walk, &config, remote, format).await?;
        }
        Commands::Handoff { message } => {
            commands::handoff(&message, &config, format)?;
        }
        Commands::Prefs {
            path,
            volume,
            muted,
            rate,
            quality,
        } => {
            commands::prefs(&path, volume, muted, rate, quality.as_deref(), format)?;
        }
    }

    Ok(())
}
