//! Streamtape direct-link resolution
//!
//! A Streamtape share link points at an HTML page, not at media. The resolver
//! validates the link against an allow-list, fetches the page with a browser
//! user agent and extracts the short-lived direct link from its markup.
//!
//! ```text
//! share url ──► validate ──► PageFetcher ──► extract_direct_link ──► mp4 url
//!                  │              │                  │
//!            DisallowedHost   Timeout/Network   ParseFailure
//! ```
//!
//! Players reach the resolver either in-process ([`StreamtapeResolver`]) or
//! through the HTTP endpoint ([`HttpResolverClient`]); both implement
//! [`ResolveStreamtape`].

mod client;
mod extract;
mod token;

pub use client::HttpResolverClient;
pub use extract::extract_direct_link;
pub use token::{RequestToken, ResolutionTracker};

use crate::{error::Error, PlayerConfig, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Hosts the resolver is willing to fetch from
pub const ALLOWED_HOST: &str = "streamtape.com";

/// A validated Streamtape page link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamtapeLink {
    pub page_url: Url,
    pub id: String,
}

/// Check a share link before any network traffic happens
pub fn validate_streamtape_url(raw: &str) -> Result<StreamtapeLink> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::InvalidSourceUrl("missing url".into()));
    }
    let mut url = Url::parse(raw).map_err(|e| Error::InvalidSourceUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::DisallowedHost(format!("{} (scheme {})", raw, url.scheme())));
    }

    let host = url
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or_else(|| Error::InvalidSourceUrl(raw.to_string()))?;
    let allowed = host == ALLOWED_HOST || host.ends_with(&format!(".{}", ALLOWED_HOST));
    if !allowed {
        return Err(Error::DisallowedHost(host));
    }

    let id = match url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .as_deref()
    {
        Some([mode, id, ..]) if matches!(*mode, "v" | "e") => id.to_string(),
        _ => {
            return Err(Error::InvalidSourceUrl(format!(
                "{} is not a /v/ or /e/ link",
                raw
            )))
        }
    };

    if url.scheme() == "http" {
        // Infallible for http -> https
        let _ = url.set_scheme("https");
    }

    Ok(StreamtapeLink { page_url: url, id })
}

/// Fetches page markup for the resolver
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, url: &Url) -> Result<String>;
}

/// reqwest-backed fetcher with a browser user agent
#[derive(Debug, Clone)]
pub struct HttpPageFetcher {
    client: Client,
    timeout: Duration,
}

impl HttpPageFetcher {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.resolver_timeout())
            .build()?;
        Ok(Self {
            client,
            timeout: config.resolver_timeout(),
        })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch_page(&self, url: &Url) -> Result<String> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                Error::ResolutionTimeout(self.timeout)
            } else {
                Error::ResolutionNetwork(e.to_string())
            }
        };

        let response = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .map_err(map_err)?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ResolutionNetwork(format!("upstream returned HTTP {}", status)));
        }

        response.text().await.map_err(map_err)
    }
}

/// Anything that turns a Streamtape share link into a direct media URL
#[async_trait]
pub trait ResolveStreamtape: Send + Sync {
    async fn resolve(&self, raw_url: &str) -> Result<String>;
}

/// In-process resolver
#[derive(Clone)]
pub struct StreamtapeResolver {
    fetcher: Arc<dyn PageFetcher>,
}

impl StreamtapeResolver {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn from_config(config: &PlayerConfig) -> Result<Self> {
        Ok(Self::new(Arc::new(HttpPageFetcher::new(config)?)))
    }

    #[instrument(skip(self), fields(url = %raw_url))]
    pub async fn resolve(&self, raw_url: &str) -> Result<String> {
        let link = validate_streamtape_url(raw_url).inspect_err(|e| {
            warn!(error = %e, "Rejected resolution request");
        })?;

        debug!(id = %link.id, page = %link.page_url, "Fetching Streamtape page");
        let html = self.fetcher.fetch_page(&link.page_url).await?;

        match extract_direct_link(&html) {
            Some(direct) => {
                info!(id = %link.id, "Resolved direct link");
                Ok(direct)
            }
            None => {
                warn!(id = %link.id, bytes = html.len(), "No direct link in page");
                Err(Error::ResolutionParseFailure)
            }
        }
    }
}

#[async_trait]
impl ResolveStreamtape for StreamtapeResolver {
    async fn resolve(&self, raw_url: &str) -> Result<String> {
        StreamtapeResolver::resolve(self, raw_url).await
    }
}
