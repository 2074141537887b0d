//! Application context
//!
//! Owns the cache instances and every background task. Built once at
//! startup and disposed on shutdown.

use std::future::Future;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::{AuthCache, CacheManager};
use crate::config::Config;
use crate::error::BoxError;
use crate::query::{QueryExecutor, QueryOptimizer};
use crate::strategy::CacheStrategy;
use crate::tasks::{spawn_cleanup_task, spawn_refresh_task};

/// Handles shared with every request handler.
///
/// Cloning is cheap; all fields are reference counted.
#[derive(Clone, Debug)]
pub struct AppState {
    pub cache: CacheManager,
    pub auth: AuthCache,
    pub optimizer: QueryOptimizer,
}

impl AppState {
    /// Builds the caches without starting any task.
    pub fn from_config(config: &Config, executor: Arc<dyn QueryExecutor>) -> Self {
        let cache = CacheManager::from_config(config);
        let optimizer =
            QueryOptimizer::with_batch_window(cache.clone(), executor, config.batch_window());
        Self {
            cache,
            auth: AuthCache::new(),
            optimizer,
        }
    }
}

/// Cache layer plus the tasks keeping it tidy.
pub struct AppContext {
    state: AppState,
    tasks: Vec<JoinHandle<()>>,
}

impl AppContext {
    /// Builds the caches and starts both expiry sweeps.
    ///
    /// Must be called from within a tokio runtime.
    pub fn init(config: &Config, executor: Arc<dyn QueryExecutor>) -> Self {
        let state = AppState::from_config(config, executor);
        let tasks = vec![
            spawn_cleanup_task(state.cache.clone(), config.cleanup_interval()),
            spawn_cleanup_task(state.auth.clone(), config.auth_cleanup_interval()),
        ];
        info!(
            max_size = config.max_size,
            max_entries = config.max_entries,
            default_ttl_secs = config.default_ttl,
            "cache layer initialized"
        );
        Self { state, tasks }
    }

    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Keeps `key` warm on `strategy`'s refetch cadence.
    ///
    /// Returns false when the strategy has no refetch interval.
    pub fn register_refresh<T, F, Fut, E>(
        &mut self,
        key: impl Into<String>,
        fetch: F,
        strategy: CacheStrategy,
    ) -> bool
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        E: Into<BoxError> + Send + 'static,
    {
        match spawn_refresh_task(self.state.cache.clone(), key, fetch, strategy) {
            Some(handle) => {
                self.tasks.push(handle);
                true
            }
            None => false,
        }
    }

    /// Loads the homepage bundle and settings ahead of the first request.
    pub async fn warm(&self) {
        if let Err(err) = self.state.optimizer.homepage_data().await {
            warn!(error = %err, "homepage warm-up failed");
        }
        if let Err(err) = self.state.optimizer.settings().await {
            warn!(error = %err, "settings warm-up failed");
        }
    }

    /// Number of background tasks still owned.
    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Aborts every background task. Safe to call more than once.
    pub fn dispose(&mut self) {
        let count = self.tasks.len();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if count > 0 {
            info!(tasks = count, "background tasks stopped");
        }
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
