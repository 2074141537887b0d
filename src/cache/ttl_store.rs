//! TTL Entry Store Module
//!
//! Generic expiring key-value container with hit counting and size accounting.
//! Pure in-memory data structure; callers provide synchronization.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::cache::entry::{CacheEntry, Priority};
use crate::error::{CacheError, Result};

/// Outcome of a non-destructive lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    /// Entry exists and is within its TTL
    Fresh(T),
    /// Entry exists but its TTL has elapsed
    Stale(T),
    Missing,
}

/// Serialized byte footprint of a payload.
pub fn payload_size<T: Serialize>(key: &str, data: &T) -> Result<usize> {
    serde_json::to_vec(data)
        .map(|bytes| bytes.len())
        .map_err(|err| CacheError::serialization(key, err))
}

// == TTL Store ==
/// Expiring key-value storage.
#[derive(Debug)]
pub struct TtlStore<T> {
    entries: HashMap<String, CacheEntry<T>>,
    total_size: usize,
}

impl<T> Default for TtlStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            total_size: 0,
        }
    }
}

impl<T: Clone> TtlStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    // == Set ==
    /// Inserts or overwrites an entry, resetting its timestamp and hit count.
    ///
    /// Fails only when the payload cannot be serialized for size accounting.
    pub fn set(&mut self, key: impl Into<String>, data: T, ttl: Duration) -> Result<()>
    where
        T: Serialize,
    {
        let key = key.into();
        let size = payload_size(&key, &data)?;
        self.insert(CacheEntry::new(key, data, ttl, size));
        Ok(())
    }

    /// Inserts or overwrites with an explicit priority.
    pub fn set_with_priority(
        &mut self,
        key: impl Into<String>,
        data: T,
        ttl: Duration,
        priority: Priority,
    ) -> Result<()>
    where
        T: Serialize,
    {
        let key = key.into();
        let size = payload_size(&key, &data)?;
        self.insert(CacheEntry::new(key, data, ttl, size).with_priority(priority));
        Ok(())
    }

    /// Stores a pre-built entry, replacing any previous entry under the same key.
    pub fn insert(&mut self, entry: CacheEntry<T>) -> Option<CacheEntry<T>> {
        self.total_size += entry.size;
        let previous = self.entries.insert(entry.key.clone(), entry);
        if let Some(old) = &previous {
            self.total_size -= old.size;
        }
        previous
    }

    // == Get ==
    /// Returns the payload only if the entry exists and is valid.
    ///
    /// An expired entry found here is deleted.
    pub fn get(&mut self, key: &str) -> Option<T> {
        match self.lookup(key) {
            Lookup::Fresh(data) => Some(data),
            Lookup::Stale(_) => {
                self.remove(key);
                None
            }
            Lookup::Missing => None,
        }
    }

    // == Lookup ==
    /// Reads an entry without deleting it when expired.
    ///
    /// Fresh reads count as hits; stale reads do not.
    pub fn lookup(&mut self, key: &str) -> Lookup<T> {
        match self.entries.get_mut(key) {
            Some(entry) if entry.is_valid() => {
                entry.record_hit();
                Lookup::Fresh(entry.data.clone())
            }
            Some(entry) => Lookup::Stale(entry.data.clone()),
            None => Lookup::Missing,
        }
    }

    /// Borrows an entry with its metadata, expired or not.
    pub fn entry(&self, key: &str) -> Option<&CacheEntry<T>> {
        self.entries.get(key)
    }

    /// True if a valid entry exists for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.get(key).is_some_and(CacheEntry::is_valid)
    }

    // == Remove ==
    pub fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
        let removed = self.entries.remove(key)?;
        self.total_size -= removed.size;
        Some(removed)
    }

    // == Clear ==
    /// Removes all entries, or only those whose key contains `pattern`.
    ///
    /// Returns the number of entries removed.
    pub fn clear(&mut self, pattern: Option<&str>) -> usize {
        match pattern {
            None => {
                let count = self.entries.len();
                self.entries.clear();
                self.total_size = 0;
                count
            }
            Some(pattern) => self.retain(|key, _| !key.contains(pattern)),
        }
    }

    /// Keeps only the entries for which `keep` returns true.
    ///
    /// Returns the number of entries removed.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str, &CacheEntry<T>) -> bool,
    {
        let before = self.entries.len();
        let mut freed = 0;
        self.entries.retain(|key, entry| {
            let kept = keep(key, entry);
            if !kept {
                freed += entry.size;
            }
            kept
        });
        self.total_size -= freed;
        before - self.entries.len()
    }

    // == Cleanup ==
    /// Removes every expired entry, accessed or not.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        self.retain(|_, entry| entry.is_valid())
    }

    pub fn entries(&self) -> impl Iterator<Item = &CacheEntry<T>> {
        self.entries.values()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    // == Length ==
    /// Number of stored entries, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the stored payload sizes in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }
}
