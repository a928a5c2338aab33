//! Streamtape resolution route.
//!
//! `GET /resolve-streamtape?url=<share link>` answers `{"url": ...}` with the
//! direct media link, or an error body the player turns into the embed
//! fallback.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use vidgate_core::Error;

use crate::error::ApiResult;
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ResolveQuery {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub url: String,
}

#[instrument(skip_all)]
pub async fn resolve_streamtape(
    State(state): State<AppState>,
    Query(query): Query<ResolveQuery>,
) -> ApiResult<Json<ResolveResponse>> {
    let raw = query.url.unwrap_or_default();

    let result = match tokio::time::timeout(state.resolve_timeout, state.resolver.resolve(&raw)).await {
        Ok(result) => result,
        Err(_) => Err(Error::ResolutionTimeout(state.resolve_timeout)),
    };

    match result {
        Ok(url) => {
            info!(share = %raw, "Resolved");
            Ok(Json(ResolveResponse { url }))
        }
        Err(e) => {
            warn!(share = %raw, error = %e, code = e.error_code(), "Resolution failed");
            Err(e.into())
        }
    }
}
