//! Query batching window.
//!
//! Requests enqueued within one window are grouped by collection. Identical
//! queries inside a group run once and every caller receives the same rows;
//! each collection group costs one executor round trip.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{CacheError, SharedError};
use crate::query::executor::QueryExecutor;
use crate::query::spec::QuerySpec;

type BatchReply = Result<Arc<Vec<Value>>, SharedError>;

/// One pending logical query, alive for at most one window.
pub struct BatchRequest {
    pub collection: String,
    pub spec: QuerySpec,
    /// Canonical key of `spec`; identical keys share one execution
    pub key: String,
    responder: oneshot::Sender<BatchReply>,
}

/// Batching efficiency counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    pub batches: u64,
    pub batched_requests: u64,
    pub executions: u64,
    pub round_trips: u64,
    /// `batched_requests - round_trips`, accumulated over all batches
    pub saved_round_trips: u64,
}

#[derive(Default)]
struct Pending {
    requests: Vec<BatchRequest>,
    flush_scheduled: bool,
}

struct BatchInner {
    window: Duration,
    executor: Arc<dyn QueryExecutor>,
    pending: Mutex<Pending>,
    stats: Mutex<BatchStats>,
}

/// Collects queries for one window, then executes them grouped by collection.
#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<BatchInner>,
}

impl BatchQueue {
    pub fn new(executor: Arc<dyn QueryExecutor>, window: Duration) -> Self {
        Self {
            inner: Arc::new(BatchInner {
                window,
                executor,
                pending: Mutex::new(Pending::default()),
                stats: Mutex::new(BatchStats::default()),
            }),
        }
    }

    /// Queues a query and waits for the flush of the current window.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn enqueue(
        &self,
        collection: String,
        spec: QuerySpec,
        key: String,
    ) -> Result<Vec<Value>, CacheError> {
        let (responder, reply) = oneshot::channel();
        let schedule = {
            let mut pending = self.inner.pending.lock();
            pending.requests.push(BatchRequest {
                collection,
                spec,
                key: key.clone(),
                responder,
            });
            !std::mem::replace(&mut pending.flush_scheduled, true)
        };

        if schedule {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                tokio::time::sleep(inner.window).await;
                inner.flush().await;
            });
        }

        match reply.await {
            Ok(Ok(rows)) => Ok(rows.as_ref().clone()),
            Ok(Err(source)) => Err(CacheError::Fetch { key, source }),
            Err(_) => Err(CacheError::BatchAborted(key)),
        }
    }

    pub fn stats(&self) -> BatchStats {
        self.inner.stats.lock().clone()
    }

    /// Requests waiting for the current window to close.
    pub fn pending(&self) -> usize {
        self.inner.pending.lock().requests.len()
    }
}

/// Distinct queries of one collection and everyone waiting on each.
#[derive(Default)]
struct Group {
    specs: Vec<QuerySpec>,
    waiters: Vec<Vec<oneshot::Sender<BatchReply>>>,
    index: BTreeMap<String, usize>,
}

impl Group {
    fn add(&mut self, request: BatchRequest) {
        match self.index.get(&request.key) {
            Some(&slot) => self.waiters[slot].push(request.responder),
            None => {
                self.index.insert(request.key, self.specs.len());
                self.specs.push(request.spec);
                self.waiters.push(vec![request.responder]);
            }
        }
    }
}

impl BatchInner {
    async fn flush(&self) {
        let requests = {
            let mut pending = self.pending.lock();
            pending.flush_scheduled = false;
            std::mem::take(&mut pending.requests)
        };
        if requests.is_empty() {
            return;
        }

        let total = requests.len();
        let mut groups: BTreeMap<String, Group> = BTreeMap::new();
        for request in requests {
            groups
                .entry(request.collection.clone())
                .or_default()
                .add(request);
        }
        let round_trips = groups.len();
        let executions: usize = groups.values().map(|g| g.specs.len()).sum();

        {
            let mut stats = self.stats.lock();
            stats.batches += 1;
            stats.batched_requests += total as u64;
            stats.executions += executions as u64;
            stats.round_trips += round_trips as u64;
            stats.saved_round_trips += (total - round_trips) as u64;
        }
        debug!(requests = total, round_trips, executions, "flushing query batch");

        join_all(groups.into_iter().map(|(collection, group)| async move {
            let results = self.executor.execute_many(&collection, &group.specs).await;
            for (outcome, waiters) in results.into_iter().zip(group.waiters) {
                let reply: BatchReply = match outcome {
                    Ok(rows) => Ok(Arc::new(rows)),
                    Err(err) => {
                        warn!(collection = %collection, error = %err, "batched query failed");
                        Err(Arc::from(err))
                    }
                };
                for waiter in waiters {
                    // Receiver gone means the caller stopped waiting
                    let _ = waiter.send(reply.clone());
                }
            }
        }))
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::query::executor::MemoryExecutor;
    use crate::query::key::query_cache_key;
    use crate::query::spec::QueryOptions;
    use async_trait::async_trait;
    use serde_json::json;

    fn executor() -> Arc<MemoryExecutor> {
        Arc::new(
            MemoryExecutor::from_json(json!({
                "services": [{"id": 1, "status": "published"}, {"id": 2, "status": "draft"}],
                "projects": [{"id": 10}]
            }))
            .unwrap(),
        )
    }

    fn request(
        queue: &BatchQueue,
        collection: &str,
        spec: QuerySpec,
    ) -> impl std::future::Future<Output = Result<Vec<Value>, CacheError>> {
        let key = query_cache_key(collection, &spec);
        let queue = queue.clone();
        let collection = collection.to_string();
        async move { queue.enqueue(collection, spec, key).await }
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_requests_execute_once() {
        let executor = executor();
        let queue = BatchQueue::new(executor.clone(), Duration::from_millis(10));
        let spec = QueryOptions::new().filter("status", "published").spec;

        let results = join_all((0..5).map(|_| request(&queue, "services", spec.clone()))).await;

        assert!(results.iter().all(|r| r.as_ref().unwrap().len() == 1));
        assert_eq!(executor.executions(), 1);
        let stats = queue.stats();
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.batched_requests, 5);
        assert_eq!(stats.saved_round_trips, 4);
        assert_eq!(queue.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_grouped_by_collection() {
        let executor = executor();
        let queue = BatchQueue::new(executor.clone(), Duration::from_millis(10));

        let (services, drafts, projects) = tokio::join!(
            request(&queue, "services", QuerySpec::default()),
            request(&queue, "services", QueryOptions::new().filter("status", "draft").spec),
            request(&queue, "projects", QuerySpec::default()),
        );

        assert_eq!(services.unwrap().len(), 2);
        assert_eq!(drafts.unwrap(), vec![json!({"id": 2, "status": "draft"})]);
        assert_eq!(projects.unwrap().len(), 1);

        let stats = queue.stats();
        assert_eq!(stats.round_trips, 2);
        assert_eq!(stats.executions, 3);
        assert_eq!(stats.saved_round_trips, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_do_not_coalesce() {
        let executor = executor();
        let queue = BatchQueue::new(executor.clone(), Duration::from_millis(10));

        request(&queue, "services", QuerySpec::default()).await.unwrap();
        request(&queue, "services", QuerySpec::default()).await.unwrap();

        assert_eq!(executor.executions(), 2);
        assert_eq!(queue.stats().batches, 2);
    }

    struct Failing;

    #[async_trait]
    impl QueryExecutor for Failing {
        async fn execute(&self, collection: &str, _spec: &QuerySpec) -> Result<Vec<Value>, BoxError> {
            Err(format!("{collection} unavailable").into())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_reaches_every_waiter() {
        let queue = BatchQueue::new(Arc::new(Failing), Duration::from_millis(10));

        let (a, b) = tokio::join!(
            request(&queue, "services", QuerySpec::default()),
            request(&queue, "services", QuerySpec::default()),
        );

        for result in [a, b] {
            match result {
                Err(CacheError::Fetch { source, .. }) => {
                    assert_eq!(source.to_string(), "services unavailable")
                }
                other => panic!("expected fetch error, got {other:?}"),
            }
        }
    }
}
