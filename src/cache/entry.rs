//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL, hit and size accounting.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

// == Priority ==
/// Eviction-resistance class of an entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Bonus added to the eviction score. Higher survives longer.
    pub fn weight(self) -> f64 {
        match self {
            Priority::Low => -10.0,
            Priority::Normal => 0.0,
            Priority::High => 50.0,
        }
    }
}

// == Cache Entry ==
/// Represents a single cache entry with payload and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// Key the entry is stored under
    pub key: String,
    /// The stored payload
    pub data: T,
    /// Creation or last refresh instant
    pub timestamp: Instant,
    /// Lifetime measured from `timestamp`
    pub ttl: Duration,
    /// Successful fresh reads since the last refresh
    pub hits: u64,
    /// Serialized payload size in bytes
    pub size: usize,
    /// Eviction-resistance class
    pub priority: Priority,
}

impl<T> CacheEntry<T> {
    // == Constructor ==
    /// Creates a new entry stamped with the current instant.
    pub fn new(key: impl Into<String>, data: T, ttl: Duration, size: usize) -> Self {
        Self {
            key: key.into(),
            data,
            timestamp: Instant::now(),
            ttl,
            hits: 0,
            size,
            priority: Priority::Normal,
        }
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    // == Validity ==
    /// An entry is valid while `now - timestamp < ttl`.
    ///
    /// Once the TTL has fully elapsed the entry is expired, including the exact boundary.
    pub fn is_valid(&self) -> bool {
        self.age() < self.ttl
    }

    pub fn is_expired(&self) -> bool {
        !self.is_valid()
    }

    /// Time elapsed since the entry was written.
    pub fn age(&self) -> Duration {
        Instant::now().saturating_duration_since(self.timestamp)
    }

    /// Remaining lifetime, zero once expired.
    pub fn ttl_remaining(&self) -> Duration {
        self.ttl.saturating_sub(self.age())
    }

    /// Eviction score: lower scores are evicted first.
    pub fn eviction_score(&self) -> f64 {
        self.hits as f64 + self.age().as_secs_f64() + self.priority.weight()
    }

    pub(crate) fn record_hit(&mut self) {
        self.hits = self.hits.saturating_add(1);
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_entry_valid_until_ttl_elapses() {
        let entry = CacheEntry::new("k", "v", Duration::from_secs(10), 3);

        assert!(entry.is_valid());
        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert!(entry.is_valid());

        // Exactly at the boundary the entry is expired
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_remaining_counts_down() {
        let entry = CacheEntry::new("k", 1u8, Duration::from_secs(10), 1);
        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(entry.ttl_remaining(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_eviction_score_combines_hits_age_and_priority() {
        let mut entry = CacheEntry::new("k", (), Duration::from_secs(60), 0);
        entry.record_hit();
        entry.record_hit();
        tokio::time::advance(Duration::from_secs(3)).await;
        assert!((entry.eviction_score() - 5.0).abs() < 1e-6);

        let high = CacheEntry::new("h", (), Duration::from_secs(60), 0).with_priority(Priority::High);
        assert!(high.eviction_score() > entry.eviction_score());
    }

    #[test]
    fn test_priority_weights_are_ordered() {
        assert!(Priority::Low.weight() < Priority::Normal.weight());
        assert!(Priority::Normal.weight() < Priority::High.weight());

        let low = CacheEntry::new("l", (), Duration::from_secs(60), 0).with_priority(Priority::Low);
        let normal = CacheEntry::new("n", (), Duration::from_secs(60), 0);
        assert!(low.eviction_score() < normal.eviction_score());
    }

    #[test]
    fn test_zero_ttl_is_immediately_expired() {
        let entry = CacheEntry::new("k", (), Duration::ZERO, 0);
        assert!(entry.is_expired());
    }

    #[test]
    fn test_priority_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Priority::High).unwrap(), "\"high\"");
        assert_eq!(Priority::default(), Priority::Normal);
    }
}
