//! API server setup.

use axum::Router;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use vidgate_core::{ResolveStreamtape, StreamtapeResolver};

use crate::config::ServerConfig;
use crate::routes;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Server start time for uptime calculation
    pub start_time: Instant,
    /// Streamtape resolver; injected so tests never touch the network
    pub resolver: Arc<dyn ResolveStreamtape>,
    /// Upper bound on one resolution, page fetch included
    pub resolve_timeout: Duration,
}

impl AppState {
    pub fn new(resolver: Arc<dyn ResolveStreamtape>, resolve_timeout: Duration) -> Self {
        Self {
            start_time: Instant::now(),
            resolver,
            resolve_timeout,
        }
    }

    /// State backed by the reqwest page fetcher
    pub fn from_config(config: &ServerConfig) -> vidgate_core::Result<Self> {
        let resolver = StreamtapeResolver::from_config(&config.player)?;
        Ok(Self::new(Arc::new(resolver), config.resolver_timeout()))
    }
}

/// Resolver HTTP server.
pub struct ApiServer {
    config: ServerConfig,
    state: AppState,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    /// Build the router with middleware applied.
    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.config.enable_cors)
    }

    /// Serve until ctrl-c.
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.config.socket_addr();
        let listener = TcpListener::bind(&addr).await?;
        info!(addr = %listener.local_addr()?, "Resolver listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Resolver stopped");
        Ok(())
    }
}

/// Routes plus tracing and optional CORS.
pub fn build_router(state: AppState, enable_cors: bool) -> Router {
    let router = routes::create_router(state).layer(TraceLayer::new_for_http());
    if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
