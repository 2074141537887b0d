//! Query optimizer
//!
//! Cached, batched collection queries over a pluggable [`QueryExecutor`].

mod batch;
mod deps;
mod executor;
mod key;
mod optimizer;
mod spec;

pub use batch::{BatchQueue, BatchRequest, BatchStats};
pub use deps::DependencyGraph;
pub use executor::{apply, MemoryExecutor, QueryExecutor};
pub use key::{canonical_json, collection_prefix, query_cache_key};
pub use optimizer::{
    homepage_inputs, HomepageData, InvalidationReport, MutationKind, OptimizerStats,
    QueryOptimizer, DEFAULT_BATCH_WINDOW,
};
pub use spec::{OrderBy, QueryOptions, QuerySpec};
