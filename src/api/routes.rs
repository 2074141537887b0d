//! API Routes
//!
//! Configures the Axum router with all diagnostics endpoints.

use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    clear_handler, collection_handler, health_handler, homepage_handler, invalidate_handler,
    invalidate_pattern_handler, settings_handler, stats_handler,
};
use crate::context::AppState;

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /health` - Health check
/// - `GET /stats` - Cache and batching statistics
/// - `GET /homepage` - Cached homepage bundle
/// - `GET /settings` - Cached site settings
/// - `GET /collections/:name` - Cached collection query
/// - `POST /invalidate` - Invalidate after a write to a collection
/// - `POST /invalidate/pattern` - Invalidate keys matching a pattern
/// - `DELETE /cache` - Drop every entry
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/homepage", get(homepage_handler))
        .route("/settings", get(settings_handler))
        .route("/collections/:name", get(collection_handler))
        .route("/invalidate", post(invalidate_handler))
        .route("/invalidate/pattern", post(invalidate_pattern_handler))
        .route("/cache", delete(clear_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
