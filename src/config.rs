//! Configuration Module
//!
//! Handles loading cache layer and service configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::auth::AUTH_CLEANUP_INTERVAL;

/// Cache layer and diagnostics service configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Byte budget for the cache manager
    pub max_size: usize,
    /// Maximum number of entries the cache manager can hold
    pub max_entries: usize,
    /// Default TTL in seconds for entries without explicit TTL
    pub default_ttl: u64,
    /// Cache manager cleanup interval in seconds
    pub cleanup_interval: u64,
    /// Auth cache cleanup interval in seconds
    pub auth_cleanup_interval: u64,
    /// Query batching window in milliseconds
    pub batch_window_ms: u64,
    /// Whether concurrent misses on one key share a single fetch
    pub dedupe_in_flight: bool,
    /// HTTP server port
    pub server_port: u16,
    /// Optional JSON seed file for the in-memory query executor
    pub data_file: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Byte budget (default: 50 MiB)
    /// - `CACHE_MAX_ENTRIES` - Maximum cache entries (default: 1000)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds (default: 300)
    /// - `CACHE_CLEANUP_INTERVAL` - Cache sweep frequency in seconds (default: 60)
    /// - `AUTH_CLEANUP_INTERVAL` - Auth cache sweep frequency in seconds (default: 300)
    /// - `BATCH_WINDOW_MS` - Query batching window in milliseconds (default: 10)
    /// - `CACHE_DEDUPE_IN_FLIGHT` - Share in-flight fetches (default: true)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_FILE` - Seed data for the in-memory executor (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            max_size: parse_var("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            max_entries: parse_var("CACHE_MAX_ENTRIES").unwrap_or(defaults.max_entries),
            default_ttl: parse_var("CACHE_DEFAULT_TTL").unwrap_or(defaults.default_ttl),
            cleanup_interval: parse_var("CACHE_CLEANUP_INTERVAL")
                .unwrap_or(defaults.cleanup_interval),
            auth_cleanup_interval: parse_var("AUTH_CLEANUP_INTERVAL")
                .unwrap_or(defaults.auth_cleanup_interval),
            batch_window_ms: parse_var("BATCH_WINDOW_MS").unwrap_or(defaults.batch_window_ms),
            dedupe_in_flight: parse_var("CACHE_DEDUPE_IN_FLIGHT")
                .unwrap_or(defaults.dedupe_in_flight),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            data_file: env::var("DATA_FILE")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    pub fn auth_cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.auth_cleanup_interval)
    }

    pub fn batch_window(&self) -> Duration {
        Duration::from_millis(self.batch_window_ms)
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: 50 * 1024 * 1024,
            max_entries: 1000,
            default_ttl: 300,
            cleanup_interval: 60,
            auth_cleanup_interval: AUTH_CLEANUP_INTERVAL.as_secs(),
            batch_window_ms: 10,
            dedupe_in_flight: true,
            server_port: 3000,
            data_file: None,
        }
    }
}
