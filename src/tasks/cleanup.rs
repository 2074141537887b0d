//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from a cache.

use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{AuthCache, CacheManager};

/// A cache that can drop its expired entries.
pub trait Sweep: Send + Sync + 'static {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Removes expired entries. Returns the number removed.
    fn sweep(&self) -> usize;
}

impl Sweep for CacheManager {
    fn name(&self) -> &'static str {
        "cache manager"
    }

    fn sweep(&self) -> usize {
        self.cleanup_expired()
    }
}

impl Sweep for AuthCache {
    fn name(&self) -> &'static str {
        "auth cache"
    }

    fn sweep(&self) -> usize {
        self.cleanup()
    }
}

/// Spawns a task that sweeps `target` every `interval`.
///
/// The first sweep runs one full interval after spawning. The returned
/// handle is aborted on shutdown.
///
/// # Example
/// ```ignore
/// let cache = CacheManager::new(50 * 1024 * 1024, 1000, Duration::from_secs(300));
/// let sweep = spawn_cleanup_task(cache.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// sweep.abort();
/// ```
pub fn spawn_cleanup_task<S: Sweep>(target: S, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(
            target = target.name(),
            interval_secs = interval.as_secs(),
            "starting expiry sweep task"
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = target.sweep();
            if removed > 0 {
                info!(target = target.name(), removed, "expiry sweep removed entries");
            } else {
                debug!(target = target.name(), "expiry sweep found nothing to remove");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;

    const SECOND: Duration = Duration::from_secs(1);

    fn manager() -> CacheManager {
        CacheManager::new(1024 * 1024, 100, Duration::from_secs(300))
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_removes_expired_entries() {
        let cache = manager();
        cache
            .set("expire_soon", &"value", CacheOptions::new().ttl(SECOND))
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), SECOND);

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert!(!cache.has("expire_soon"), "expired entry should have been swept");
        assert_eq!(cache.total_size(), 0);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_task_preserves_valid_entries() {
        let cache = manager();
        cache
            .set("long_lived", &"value", CacheOptions::new().ttl(3600 * SECOND))
            .unwrap();

        let handle = spawn_cleanup_task(cache.clone(), SECOND);

        tokio::time::sleep(Duration::from_millis(1500)).await;

        let value: Option<String> = cache.get_sync("long_lived").unwrap();
        assert_eq!(value.as_deref(), Some("value"));

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_cache_sweep() {
        let auth = AuthCache::new();
        auth.set_session_valid("u1", true).unwrap();
        auth.set_role("u1", "admin").unwrap();

        let handle = spawn_cleanup_task(auth.clone(), 90 * SECOND);

        // Session (60 s) expires before the first sweep, role (5 min) does not
        tokio::time::sleep(100 * SECOND).await;

        assert_eq!(auth.len(), 1);
        assert_eq!(auth.role("u1").as_deref(), Some("admin"));

        handle.abort();
    }

    #[tokio::test]
    async fn test_cleanup_task_can_be_aborted() {
        let handle = spawn_cleanup_task(manager(), SECOND);

        handle.abort();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "task should be finished after abort");
    }
}
