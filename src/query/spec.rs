//! Query shape and per-call options.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Column ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub column: String,
    pub ascending: bool,
}

/// Logical shape of a collection query: what the executor needs to run it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    /// Comma separated column list; `None` selects every column
    #[serde(skip_serializing_if = "Option::is_none")]
    pub select: Option<String>,
    /// Column → required value equality filters
    #[serde(skip_serializing_if = "Map::is_empty", default)]
    pub filters: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_by: Option<OrderBy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl QuerySpec {
    /// Selected column names, or `None` for every column.
    pub fn columns(&self) -> Option<Vec<&str>> {
        let select = self.select.as_deref()?.trim();
        if select.is_empty() || select == "*" {
            return None;
        }
        Some(
            select
                .split(',')
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .collect(),
        )
    }
}

/// Options for `QueryOptimizer::query`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub spec: QuerySpec,
    /// Explicit cache key; derived from the spec when unset
    pub cache_key: Option<String>,
    /// Entry lifetime; the collection strategy's stale time when unset
    pub cache_ttl: Option<Duration>,
    pub enable_batching: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            spec: QuerySpec::default(),
            cache_key: None,
            cache_ttl: None,
            enable_batching: true,
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.spec.select = Some(columns.into());
        self
    }

    #[must_use]
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.spec.filters.insert(column.into(), value.into());
        self
    }

    /// Replaces the filters with the fields of a JSON object.
    ///
    /// Non-object values leave the filters empty.
    #[must_use]
    pub fn filters(mut self, filters: Value) -> Self {
        self.spec.filters = match filters {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    #[must_use]
    pub fn order_by(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.spec.order_by = Some(OrderBy {
            column: column.into(),
            ascending,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn cache_key(mut self, key: impl Into<String>) -> Self {
        self.cache_key = Some(key.into());
        self
    }

    #[must_use]
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    #[must_use]
    pub fn batching(mut self, enabled: bool) -> Self {
        self.enable_batching = enabled;
        self
    }
}
