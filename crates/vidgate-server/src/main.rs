//! Vidgate resolver server

use clap::Parser;
use tracing_subscriber::EnvFilter;
use vidgate_server::{ApiServer, AppState, ServerConfig};

/// Streamtape resolver service
#[derive(Parser)]
#[command(name = "vidgate-server")]
#[command(version)]
#[command(about = "HTTP resolver for Streamtape share links", long_about = None)]
struct Args {
    /// Bind address (overrides VIDGATE_BIND_ADDRESS)
    #[arg(long)]
    bind: Option<String>,

    /// Port (overrides VIDGATE_PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Resolution timeout in milliseconds (overrides VIDGATE_RESOLVER_TIMEOUT_MS)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing; RUST_LOG wins over the verbose flag
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if args.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let mut config = ServerConfig::from_env_or_default();
    if let Some(bind) = args.bind {
        config.bind_address = bind;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(ms) = args.timeout_ms {
        config.player.resolver_timeout_ms = ms;
    }
    config.player.validate()?;

    vidgate_core::init();
    let state = AppState::from_config(&config)?;
    ApiServer::new(config, state).run().await
}
