//! Devmart cache layer
//!
//! TTL entry store, auth cache, get-or-compute cache manager with
//! space-bounded eviction, and a query optimizer that batches collection
//! queries and invalidates through declared dependencies.

pub mod api;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod query;
pub mod strategy;
pub mod tasks;

pub use cache::{AuthCache, CacheManager, CacheOptions, KeyPattern, Priority};
pub use config::Config;
pub use context::{AppContext, AppState};
pub use error::{CacheError, Result};
pub use query::{MemoryExecutor, QueryExecutor, QueryOptimizer, QueryOptions};
pub use tasks::spawn_cleanup_task;
