//! API Module
//!
//! HTTP handlers and routing for the diagnostics service.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache and batching statistics
//! - `GET /homepage`, `GET /settings` - Composite caches
//! - `GET /collections/:name` - Cached collection query
//! - `POST /invalidate`, `POST /invalidate/pattern`, `DELETE /cache` - Invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
