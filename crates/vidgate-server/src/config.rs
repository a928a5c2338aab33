//! Server configuration.

use std::time::Duration;
use vidgate_core::PlayerConfig;

/// Resolver server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: String,
    /// Server port
    pub port: u16,
    /// Enable CORS for browser players on other origins
    pub enable_cors: bool,
    /// Fetch settings shared with the player (user agent, resolver timeout)
    pub player: PlayerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 8787,
            enable_cors: true,
            player: PlayerConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Supported env vars:
    /// - `VIDGATE_BIND_ADDRESS` (e.g. "127.0.0.1")
    /// - `VIDGATE_PORT` (e.g. "8787")
    /// - `VIDGATE_RESOLVER_TIMEOUT_MS` (e.g. "12000")
    /// - `VIDGATE_CORS` ("false" disables)
    pub fn from_env_or_default() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bind_address) = lookup("VIDGATE_BIND_ADDRESS") {
            if !bind_address.trim().is_empty() {
                config.bind_address = bind_address.trim().to_string();
            }
        }

        if let Some(port) = lookup("VIDGATE_PORT").and_then(|p| p.trim().parse::<u16>().ok()) {
            config.port = port;
        }

        if let Some(ms) = lookup("VIDGATE_RESOLVER_TIMEOUT_MS").and_then(|v| v.trim().parse::<u64>().ok()) {
            if ms > 0 {
                config.player.resolver_timeout_ms = ms;
            }
        }

        if let Some(cors) = lookup("VIDGATE_CORS") {
            config.enable_cors = !matches!(cors.trim().to_ascii_lowercase().as_str(), "0" | "false" | "off");
        }

        config
    }

    pub fn resolver_timeout(&self) -> Duration {
        self.player.resolver_timeout()
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}
