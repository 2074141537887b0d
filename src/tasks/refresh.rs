//! Background Refresh Task
//!
//! Re-fetches a cache key on the cadence of its strategy so readers keep
//! hitting warm entries.

use std::future::Future;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{CacheManager, CacheOptions};
use crate::error::BoxError;
use crate::strategy::CacheStrategy;

/// Spawns a task refreshing `key` every `strategy.refetch_interval`.
///
/// Each refresh retries per `strategy.retry`; a refresh that still fails
/// leaves the existing entry in place. Returns `None` when the strategy has
/// no refetch interval.
pub fn spawn_refresh_task<T, F, Fut, E>(
    cache: CacheManager,
    key: impl Into<String>,
    fetch: F,
    strategy: CacheStrategy,
) -> Option<JoinHandle<()>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    E: Into<BoxError> + Send + 'static,
{
    let interval = strategy.refetch_interval?;
    let key = key.into();
    let options = CacheOptions::new()
        .ttl(strategy.stale_time)
        .priority(strategy.priority);

    Some(tokio::spawn(async move {
        info!(key = %key, interval_secs = interval.as_secs(), "starting refresh task");

        loop {
            tokio::time::sleep(interval).await;

            let outcome = strategy
                .retry
                .retry(|| cache.refresh::<T, _, _, _>(&key, &fetch, options))
                .await;
            match outcome {
                Ok(_) => debug!(key = %key, "refreshed cache entry"),
                Err(err) => warn!(key = %key, error = %err, "refresh failed, keeping cached entry"),
            }
        }
    }))
}
