//! Cache Module
//!
//! In-memory caching with TTL expiration, score-based eviction and
//! stale-on-error fallback.

pub mod auth;
mod entry;
pub mod eviction;
mod manager;
mod pattern;
mod stats;
mod ttl_store;


// Re-export public types
pub use auth::{AuthCache, AuthRecord};
pub use entry::{CacheEntry, Priority};
pub use manager::{CacheManager, CacheOptions};
pub use pattern::KeyPattern;
pub use stats::CacheStats;
pub use ttl_store::{payload_size, Lookup, TtlStore};
