//! API Handlers
//!
//! HTTP request handlers for each diagnostics endpoint.

use std::collections::{BTreeMap, HashMap};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::Value;
use tracing::info;

use crate::context::AppState;
use crate::error::{CacheError, Result};
use crate::models::{
    collection_query, CollectionResponse, HealthResponse, InvalidateRequest, InvalidateResponse,
    PatternRequest, RemovedResponse, StatsResponse,
};
use crate::query::HomepageData;

/// Handler for GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse::healthy(state.cache.len()))
}

/// Handler for GET /stats
///
/// Cache counters, bounds and query batching efficiency.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.max_size(),
        state.cache.max_entries(),
        state.auth.len(),
        state.optimizer.stats(),
    ))
}

/// Handler for GET /homepage
pub async fn homepage_handler(State(state): State<AppState>) -> Result<Json<HomepageData>> {
    Ok(Json(state.optimizer.homepage_data().await?))
}

/// Handler for GET /settings
pub async fn settings_handler(
    State(state): State<AppState>,
) -> Result<Json<BTreeMap<String, Value>>> {
    Ok(Json(state.optimizer.settings().await?))
}

/// Handler for GET /collections/:name
///
/// Runs a cached query; query string parameters become filters and options.
pub async fn collection_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<CollectionResponse>> {
    let options = collection_query(params)?;
    let rows = state.optimizer.query(&collection, options).await?;
    Ok(Json(CollectionResponse::new(collection, rows)))
}

/// Handler for POST /invalidate
///
/// Called after a write to `collection`; drops its entries and dependent composites.
pub async fn invalidate_handler(
    State(state): State<AppState>,
    Json(req): Json<InvalidateRequest>,
) -> Result<Json<InvalidateResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let operation = req.mutation()?;

    let report = state
        .optimizer
        .invalidate_cache(&req.collection, operation, req.id.as_deref());
    Ok(Json(report.into()))
}

/// Handler for POST /invalidate/pattern
pub async fn invalidate_pattern_handler(
    State(state): State<AppState>,
    Json(req): Json<PatternRequest>,
) -> Result<Json<RemovedResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }
    let pattern = req.to_pattern()?;

    let removed = state.cache.invalidate_pattern(pattern);
    info!(pattern = %req.pattern, regex = req.regex, removed, "pattern invalidation requested");
    Ok(Json(RemovedResponse::pattern(req.pattern, removed)))
}

/// Handler for DELETE /cache
pub async fn clear_handler(State(state): State<AppState>) -> Json<RemovedResponse> {
    let removed = state.cache.clear();
    state.auth.clear(None);
    Json(RemovedResponse::cleared(removed))
}
