//! Query executor seam.
//!
//! The optimizer only needs "select rows from a named collection with
//! filters, ordering and a limit". Any store exposing that can sit behind
//! [`QueryExecutor`].

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::BoxError;
use crate::query::spec::QuerySpec;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Runs one query.
    async fn execute(&self, collection: &str, spec: &QuerySpec) -> Result<Vec<Value>, BoxError>;

    /// Runs several queries against one collection as a single round trip.
    ///
    /// Results are returned in the order of `specs`.
    async fn execute_many(
        &self,
        collection: &str,
        specs: &[QuerySpec],
    ) -> Vec<Result<Vec<Value>, BoxError>> {
        join_all(specs.iter().map(|spec| self.execute(collection, spec))).await
    }
}

// == Memory Executor ==
/// In-process collection store.
///
/// Supports equality filters, single-column ordering, limits and column
/// projection. Counts executed queries so callers can observe coalescing.
#[derive(Debug, Default)]
pub struct MemoryExecutor {
    collections: RwLock<HashMap<String, Vec<Value>>>,
    executions: AtomicUsize,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a JSON object mapping collection names to row arrays.
    pub fn from_json(data: Value) -> Result<Self, BoxError> {
        let Value::Object(map) = data else {
            return Err("seed data must be a JSON object of collections".into());
        };
        let executor = Self::new();
        for (collection, rows) in map {
            match rows {
                Value::Array(rows) => executor.insert_rows(&collection, rows),
                _ => return Err(format!("collection '{collection}' is not an array").into()),
            }
        }
        Ok(executor)
    }

    /// Loads a JSON seed file, see [`MemoryExecutor::from_json`].
    pub fn from_json_file(path: &Path) -> Result<Self, BoxError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(serde_json::from_str(&text)?)
    }

    pub fn insert_rows(&self, collection: &str, rows: Vec<Value>) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .extend(rows);
    }

    /// Replaces the first row whose `id` equals `id`. Returns false if none matched.
    pub fn update_row(&self, collection: &str, id: &Value, row: Value) -> bool {
        let mut collections = self.collections.write();
        let Some(rows) = collections.get_mut(collection) else {
            return false;
        };
        match rows.iter_mut().find(|r| r.get("id") == Some(id)) {
            Some(existing) => {
                *existing = row;
                true
            }
            None => false,
        }
    }

    /// Number of queries executed so far.
    pub fn executions(&self) -> usize {
        self.executions.load(AtomicOrdering::SeqCst)
    }

    pub fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl QueryExecutor for MemoryExecutor {
    async fn execute(&self, collection: &str, spec: &QuerySpec) -> Result<Vec<Value>, BoxError> {
        self.executions.fetch_add(1, AtomicOrdering::SeqCst);
        let rows = self
            .collections
            .read()
            .get(collection)
            .cloned()
            .unwrap_or_default();
        let rows = apply(rows, spec);
        debug!(collection, rows = rows.len(), "memory query executed");
        Ok(rows)
    }
}

/// Applies filters, ordering, limit and projection, in that order.
pub fn apply(rows: Vec<Value>, spec: &QuerySpec) -> Vec<Value> {
    let mut rows: Vec<Value> = rows
        .into_iter()
        .filter(|row| {
            spec.filters
                .iter()
                .all(|(column, expected)| row.get(column) == Some(expected))
        })
        .collect();

    if let Some(order) = &spec.order_by {
        rows.sort_by(|a, b| {
            let ordering = compare(a.get(&order.column), b.get(&order.column));
            if order.ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });
    }

    if let Some(limit) = spec.limit {
        rows.truncate(limit);
    }

    match spec.columns() {
        Some(columns) => rows.into_iter().map(|row| project(row, &columns)).collect(),
        None => rows,
    }
}

fn project(row: Value, columns: &[&str]) -> Value {
    match row {
        Value::Object(mut fields) => {
            let mut projected = Map::new();
            for column in columns {
                if let Some(value) = fields.remove(*column) {
                    projected.insert((*column).to_string(), value);
                }
            }
            Value::Object(projected)
        }
        other => other,
    }
}

/// Orders missing < null < bool < number < string; other values compare equal.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: Option<&Value>) -> u8 {
        match v {
            None => 0,
            Some(Value::Null) => 1,
            Some(Value::Bool(_)) => 2,
            Some(Value::Number(_)) => 3,
            Some(Value::String(_)) => 4,
            Some(_) => 5,
        }
    }

    match (a, b) {
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}
