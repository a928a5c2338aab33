//! Client for the `/resolve-streamtape` HTTP endpoint

use super::ResolveStreamtape;
use crate::{error::Error, PlayerConfig, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResolveResponse {
    Resolved { url: String },
    Failed { error: String },
}

/// Resolves through a remote resolver service
#[derive(Debug, Clone)]
pub struct HttpResolverClient {
    client: Client,
    endpoint: Url,
    timeout: Duration,
}

impl HttpResolverClient {
    pub fn new(config: &PlayerConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.resolver_endpoint).map_err(|e| {
            Error::InvalidConfig(format!("resolver_endpoint '{}': {}", config.resolver_endpoint, e))
        })?;
        let client = Client::builder().timeout(config.resolver_timeout()).build()?;
        Ok(Self {
            client,
            endpoint,
            timeout: config.resolver_timeout(),
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl ResolveStreamtape for HttpResolverClient {
    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn resolve(&self, raw_url: &str) -> Result<String> {
        let mut request_url = self.endpoint.clone();
        request_url.query_pairs_mut().append_pair("url", raw_url);

        let response = self.client.get(request_url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::ResolutionTimeout(self.timeout)
            } else {
                Error::ResolutionNetwork(e.to_string())
            }
        })?;

        let status = response.status();
        let body: ResolveResponse = response
            .json()
            .await
            .map_err(|e| Error::ResolutionNetwork(format!("malformed resolver response: {}", e)))?;
        debug!(%status, "Resolver responded");

        match (status, body) {
            (s, ResolveResponse::Resolved { url }) if s.is_success() => Ok(url),
            (StatusCode::BAD_REQUEST, ResolveResponse::Failed { error }) => {
                Err(Error::DisallowedHost(error))
            }
            (StatusCode::NOT_FOUND, _) => Err(Error::ResolutionParseFailure),
            (StatusCode::GATEWAY_TIMEOUT, _) => Err(Error::ResolutionTimeout(self.timeout)),
            (_, ResolveResponse::Failed { error }) => Err(Error::ResolutionNetwork(error)),
            (s, _) => Err(Error::ResolutionNetwork(format!("unexpected status {}", s))),
        }
    }
}
