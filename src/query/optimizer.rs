//! Query Optimizer Module
//!
//! Sits between callers and the [`QueryExecutor`]: every query is cached
//! under a deterministic key, concurrent queries are batched per collection,
//! composite bundles are cached under umbrella keys and writes invalidate
//! through a declared dependency graph.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::cache::{CacheManager, CacheOptions, KeyPattern};
use crate::error::{CacheError, Result};
use crate::query::batch::{BatchQueue, BatchStats};
use crate::query::deps::DependencyGraph;
use crate::query::executor::QueryExecutor;
use crate::query::key::{collection_prefix, query_cache_key};
use crate::query::spec::QueryOptions;
use crate::strategy::{
    self, ContentClass, HOMEPAGE_COLLECTIONS, HOMEPAGE_KEY, INVALIDATION_CASCADES, SETTINGS_KEY,
};

/// Default batching window.
pub const DEFAULT_BATCH_WINDOW: Duration = Duration::from_millis(10);

// == Mutation Kind ==
/// Write operation that triggered an invalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    #[serde(alias = "insert")]
    Create,
    Update,
    Delete,
}

impl FromStr for MutationKind {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "create" | "insert" => Ok(MutationKind::Create),
            "update" => Ok(MutationKind::Update),
            "delete" => Ok(MutationKind::Delete),
            other => Err(CacheError::InvalidRequest(format!(
                "unknown operation '{other}', expected create, update or delete"
            ))),
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MutationKind::Create => "create",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Outcome of [`QueryOptimizer::invalidate_cache`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidationReport {
    pub collection: String,
    pub operation: MutationKind,
    pub id: Option<String>,
    /// Key prefixes that were invalidated, the collection's own first
    pub prefixes: Vec<String>,
    pub removed: usize,
}

/// Homepage bundle: every CMS section the landing page renders.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HomepageData {
    pub pages: Vec<Value>,
    pub services: Vec<Value>,
    pub projects: Vec<Value>,
    pub blog_posts: Vec<Value>,
    pub testimonials: Vec<Value>,
}

/// Query and batching counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OptimizerStats {
    pub total_queries: u64,
    /// Queries sent straight to the executor with batching disabled
    pub direct_executions: u64,
    #[serde(flatten)]
    pub batching: BatchStats,
}

struct OptimizerInner {
    cache: CacheManager,
    executor: Arc<dyn QueryExecutor>,
    batcher: BatchQueue,
    deps: RwLock<DependencyGraph>,
    total_queries: AtomicU64,
    direct_executions: Arc<AtomicU64>,
}

// == Query Optimizer ==
/// Cached, batched access to CMS collections.
///
/// Cloning is cheap; clones share the cache, batch queue and dependency graph.
#[derive(Clone)]
pub struct QueryOptimizer {
    inner: Arc<OptimizerInner>,
}

impl QueryOptimizer {
    /// Creates an optimizer with the default 10 ms batching window.
    pub fn new(cache: CacheManager, executor: Arc<dyn QueryExecutor>) -> Self {
        Self::with_batch_window(cache, executor, DEFAULT_BATCH_WINDOW)
    }

    pub fn with_batch_window(
        cache: CacheManager,
        executor: Arc<dyn QueryExecutor>,
        window: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(OptimizerInner {
                cache,
                batcher: BatchQueue::new(Arc::clone(&executor), window),
                executor,
                deps: RwLock::new(DependencyGraph::from_cascades(INVALIDATION_CASCADES)),
                total_queries: AtomicU64::new(0),
                direct_executions: Arc::new(AtomicU64::new(0)),
            }),
        }
    }

    pub fn cache(&self) -> &CacheManager {
        &self.inner.cache
    }

    // == Query ==
    /// Runs a cached query against `collection`.
    ///
    /// Entries live for `options.cache_ttl`, or the collection strategy's stale
    /// time. With batching enabled, concurrent misses inside one window share a
    /// round trip; otherwise concurrent misses for the same key share a fetch.
    pub async fn query(&self, collection: &str, options: QueryOptions) -> Result<Vec<Value>> {
        self.inner.total_queries.fetch_add(1, Ordering::Relaxed);

        let key = match &options.cache_key {
            Some(key) => {
                self.track_explicit_key(collection, key);
                key.clone()
            }
            None => query_cache_key(collection, &options.spec),
        };
        let policy = strategy::strategy_for_collection(collection);
        let cache_options = CacheOptions::new()
            .ttl(options.cache_ttl.unwrap_or(policy.stale_time))
            .priority(policy.priority);

        let collection = collection.to_string();
        let spec = options.spec;
        if options.enable_batching {
            // The batch queue coalesces identical keys itself
            let batcher = self.inner.batcher.clone();
            let batch_key = query_cache_key(&collection, &spec);
            self.inner
                .cache
                .get(
                    &key,
                    move || async move { batcher.enqueue(collection, spec, batch_key).await },
                    cache_options.dedupe(false),
                )
                .await
        } else {
            let executor = Arc::clone(&self.inner.executor);
            let direct = Arc::clone(&self.inner.direct_executions);
            self.inner
                .cache
                .get(
                    &key,
                    move || async move {
                        direct.fetch_add(1, Ordering::Relaxed);
                        executor.execute(&collection, &spec).await
                    },
                    cache_options,
                )
                .await
        }
    }

    /// Keys outside `<collection>:` are only reachable through the graph.
    fn track_explicit_key(&self, collection: &str, key: &str) {
        if key.starts_with(&collection_prefix(collection)) {
            return;
        }
        let known = self
            .inner
            .deps
            .read()
            .dependents(collection)
            .is_some_and(|keys| keys.contains(key));
        if !known {
            self.inner.deps.write().register(collection, key);
        }
    }

    /// [`QueryOptimizer::query`] with every row decoded into `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &self,
        collection: &str,
        options: QueryOptions,
    ) -> Result<Vec<T>> {
        let rows = self.query(collection, options).await?;
        rows.into_iter()
            .map(|row| {
                T::deserialize(row).map_err(|err| CacheError::Serialization {
                    key: collection.to_string(),
                    message: err.to_string(),
                })
            })
            .collect()
    }

    // == Composite Preloaders ==
    /// Homepage bundle under `homepage:data`.
    ///
    /// Section queries run concurrently through the batch queue and skip the
    /// per-collection caches, so the bundle is never older than its own TTL.
    pub async fn homepage_data(&self) -> Result<HomepageData> {
        let policy = strategy::strategy_for(ContentClass::Homepage);
        let this = self.clone();
        self.inner
            .cache
            .get(
                HOMEPAGE_KEY,
                move || async move { this.load_homepage().await },
                CacheOptions::new()
                    .ttl(policy.stale_time)
                    .priority(policy.priority),
            )
            .await
    }

    async fn load_homepage(&self) -> Result<HomepageData> {
        let published = || QueryOptions::new().filter("status", "published");
        let (pages, services, projects, blog_posts, testimonials) = futures::try_join!(
            self.fetch_uncached("pages", published()),
            self.fetch_uncached("services", published().order_by("display_order", true)),
            self.fetch_uncached(
                "projects",
                published().filter("featured", true).order_by("display_order", true)
            ),
            self.fetch_uncached(
                "blog_posts",
                published().order_by("published_at", false).limit(3)
            ),
            self.fetch_uncached("testimonials", published().limit(6)),
        )?;
        debug!(
            pages = pages.len(),
            services = services.len(),
            projects = projects.len(),
            blog_posts = blog_posts.len(),
            testimonials = testimonials.len(),
            "assembled homepage bundle"
        );
        Ok(HomepageData {
            pages,
            services,
            projects,
            blog_posts,
            testimonials,
        })
    }

    /// Runs a query through the batch queue without reading or filling the cache.
    async fn fetch_uncached(&self, collection: &str, options: QueryOptions) -> Result<Vec<Value>> {
        self.inner.total_queries.fetch_add(1, Ordering::Relaxed);
        let key = query_cache_key(collection, &options.spec);
        self.inner
            .batcher
            .enqueue(collection.to_string(), options.spec, key)
            .await
    }

    /// Site settings as `key → value`, under `settings:all`.
    pub async fn settings(&self) -> Result<BTreeMap<String, Value>> {
        let policy = strategy::strategy_for(ContentClass::Settings);
        let this = self.clone();
        self.inner
            .cache
            .get(
                SETTINGS_KEY,
                move || async move {
                    let rows = this
                        .query("settings", QueryOptions::new().select("key,value"))
                        .await?;
                    Ok::<_, CacheError>(settings_map(rows))
                },
                CacheOptions::new()
                    .ttl(policy.stale_time)
                    .priority(policy.priority),
            )
            .await
    }

    // == Invalidation ==
    /// Drops every cache entry that depends on `collection` after a write.
    pub fn invalidate_cache(
        &self,
        collection: &str,
        operation: MutationKind,
        id: Option<&str>,
    ) -> InvalidationReport {
        let prefixes = self.inner.deps.read().prefixes_for(collection);
        let removed: usize = prefixes
            .iter()
            .map(|prefix| {
                self.inner
                    .cache
                    .invalidate_pattern(KeyPattern::prefix(prefix.as_str()))
            })
            .sum();
        info!(
            collection,
            %operation,
            id = id.unwrap_or("-"),
            removed,
            "invalidated collection caches"
        );
        InvalidationReport {
            collection: collection.to_string(),
            operation,
            id: id.map(str::to_string),
            prefixes,
            removed,
        }
    }

    /// Declares that keys starting with `key_prefix` are built from `collection`.
    pub fn register_dependency(&self, collection: &str, key_prefix: &str) {
        self.inner.deps.write().register(collection, key_prefix);
    }

    /// Key prefixes invalidated when `collection` is written.
    pub fn dependencies_of(&self, collection: &str) -> Vec<String> {
        self.inner.deps.read().prefixes_for(collection)
    }

    pub fn stats(&self) -> OptimizerStats {
        OptimizerStats {
            total_queries: self.inner.total_queries.load(Ordering::Relaxed),
            direct_executions: self.inner.direct_executions.load(Ordering::Relaxed),
            batching: self.inner.batcher.stats(),
        }
    }
}

impl fmt::Debug for QueryOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryOptimizer")
            .field("cache", &self.inner.cache)
            .field("stats", &self.stats())
            .finish()
    }
}

/// Folds `{key, value}` rows into a map; rows without a string key are skipped.
fn settings_map(rows: Vec<Value>) -> BTreeMap<String, Value> {
    rows.into_iter()
        .filter_map(|mut row| {
            let key = row.get("key")?.as_str()?.to_string();
            let value = row.get_mut("value").map(Value::take).unwrap_or(Value::Null);
            Some((key, value))
        })
        .collect()
}

/// Collections whose writes reach the homepage bundle.
pub fn homepage_inputs() -> &'static [&'static str] {
    HOMEPAGE_COLLECTIONS
}
