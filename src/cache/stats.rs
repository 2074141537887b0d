//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, stale serves and evictions.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Reads answered from a valid entry
    pub hits: u64,
    /// Reads that had to go to the origin
    pub misses: u64,
    /// Failed fetches answered from an expired entry
    pub stale_hits: u64,
    /// Fetch failures, whether recovered or not
    pub fetch_errors: u64,
    /// Entries removed to respect the size or count bound
    pub evictions: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
    /// Current serialized size of all entries in bytes
    pub total_size: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_stale_hit(&mut self) {
        self.stale_hits += 1;
    }

    pub fn record_fetch_error(&mut self) {
        self.fetch_errors += 1;
    }

    pub fn record_evictions(&mut self, count: usize) {
        self.evictions += count as u64;
    }

    /// Updates the entry count and byte total.
    pub fn set_totals(&mut self, entries: usize, size: usize) {
        self.total_entries = entries;
        self.total_size = size;
    }
}
