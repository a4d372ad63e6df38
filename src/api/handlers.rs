//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::cache::QueuedCache;
use crate::error::Result;
use crate::models::{
    AccessQuery, AccessResponse, HealthResponse, InvalidateResponse, StatsResponse, UnitsResponse,
};

/// Application state shared across all handlers.
///
/// The cache is internally synchronized; cloning shares it.
#[derive(Clone)]
pub struct AppState {
    pub cache: QueuedCache,
}

impl AppState {
    /// Creates a new AppState around the given cache.
    pub fn new(cache: QueuedCache) -> Self {
        Self { cache }
    }
}

/// Handler for GET /units/:name
///
/// Returns the unit's results, serving stale values while a refresh runs.
pub async fn access_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<AccessQuery>,
) -> Result<Json<AccessResponse>> {
    let results = state.cache.access(&name, query.force).await?;

    Ok(Json(AccessResponse::new(name, results)))
}

/// Handler for DELETE /units/:name
///
/// Drops the unit's cached record so the next access recomputes it.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<InvalidateResponse>> {
    state.cache.invalidate(&name).await?;

    Ok(Json(InvalidateResponse::new(name)))
}

/// Handler for GET /units
pub async fn units_handler(State(state): State<AppState>) -> Json<UnitsResponse> {
    Json(UnitsResponse::new(
        state.cache.namespace(),
        state.cache.units(),
    ))
}

/// Handler for GET /stats
///
/// Returns current cache statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(state.cache.stats()))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
