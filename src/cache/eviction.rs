//! Eviction Planner Module
//!
//! Chooses which entries to drop before an insertion that would break the
//! byte or entry-count bound.

use crate::cache::entry::CacheEntry;

/// Fraction of `max_entries` the cache must fall below once eviction runs.
pub const HEADROOM_RATIO: f64 = 0.9;

// == Eviction Plan ==
/// Keys to remove, lowest score first, and the bytes they free.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct EvictionPlan {
    pub keys: Vec<String>,
    pub freed: usize,
}

/// True when inserting `incoming` bytes as a new key would exceed either bound.
///
/// `current_size`/`current_len` must already exclude an entry being overwritten.
pub fn needs_eviction(
    current_size: usize,
    current_len: usize,
    incoming: usize,
    max_size: usize,
    max_entries: usize,
) -> bool {
    current_size + incoming > max_size || current_len + 1 > max_entries
}

/// Builds the eviction plan for an insertion of `incoming` bytes.
///
/// Entries are ranked by `hits + age_seconds + priority weight`, ascending.
/// Removal stops once the freed bytes cover the overflow and the remaining
/// entry count is below 90% of `max_entries`.
pub fn plan<'a, T: 'a>(
    entries: impl Iterator<Item = &'a CacheEntry<T>>,
    current_size: usize,
    incoming: usize,
    max_size: usize,
    max_entries: usize,
) -> EvictionPlan {
    let mut ranked: Vec<(f64, &CacheEntry<T>)> =
        entries.map(|entry| (entry.eviction_score(), entry)).collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));

    let required = (current_size + incoming).saturating_sub(max_size);
    let count_limit = max_entries as f64 * HEADROOM_RATIO;
    let mut remaining = ranked.len();
    let mut plan = EvictionPlan::default();

    for (_, entry) in ranked {
        if plan.freed >= required && (remaining as f64) < count_limit {
            break;
        }
        plan.keys.push(entry.key.clone());
        plan.freed += entry.size;
        remaining -= 1;
    }

    plan
}
