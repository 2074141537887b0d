//! Request DTOs for the diagnostics API
//!
//! Defines the structure of incoming HTTP request bodies and query strings.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::cache::KeyPattern;
use crate::error::{CacheError, Result};
use crate::query::{MutationKind, QueryOptions};

/// Longest accepted collection name or pattern.
const MAX_NAME_LEN: usize = 256;

/// Request body for POST /invalidate
#[derive(Debug, Clone, Deserialize)]
pub struct InvalidateRequest {
    /// Collection that was written
    pub collection: String,
    /// `create`, `insert`, `update` or `delete`
    pub operation: String,
    /// Id of the written row, for logging
    #[serde(default)]
    pub id: Option<String>,
}

impl InvalidateRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.collection.is_empty() {
            return Some("Collection cannot be empty".to_string());
        }
        if self.collection.len() > MAX_NAME_LEN {
            return Some(format!(
                "Collection exceeds maximum length of {MAX_NAME_LEN} characters"
            ));
        }
        if self.collection.contains(':') {
            return Some("Collection cannot contain ':'".to_string());
        }
        None
    }

    pub fn mutation(&self) -> Result<MutationKind> {
        self.operation.parse()
    }
}

/// Request body for POST /invalidate/pattern
#[derive(Debug, Clone, Deserialize)]
pub struct PatternRequest {
    pub pattern: String,
    /// Treat `pattern` as a regular expression instead of a substring
    #[serde(default)]
    pub regex: bool,
}

impl PatternRequest {
    pub fn validate(&self) -> Option<String> {
        if self.pattern.is_empty() {
            return Some("Pattern cannot be empty".to_string());
        }
        if self.pattern.len() > MAX_NAME_LEN {
            return Some(format!(
                "Pattern exceeds maximum length of {MAX_NAME_LEN} characters"
            ));
        }
        None
    }

    pub fn to_pattern(&self) -> Result<KeyPattern> {
        if self.regex {
            KeyPattern::regex(&self.pattern)
        } else {
            Ok(KeyPattern::substring(self.pattern.as_str()))
        }
    }
}

/// Builds query options from GET /collections/:name parameters.
///
/// `limit`, `order_by`, `ascending`, `select` and `batch` are reserved;
/// every other parameter is an equality filter. Filter values that parse as
/// JSON scalars (`true`, `3`) are compared as such, anything else as a string.
pub fn collection_query(params: HashMap<String, String>) -> Result<QueryOptions> {
    let mut options = QueryOptions::new();
    let mut order_by = None;
    let mut ascending = true;

    for (name, raw) in params {
        match name.as_str() {
            "limit" => {
                let limit = raw.parse().map_err(|_| {
                    CacheError::InvalidRequest(format!(
                        "limit must be a non-negative integer, got '{raw}'"
                    ))
                })?;
                options = options.limit(limit);
            }
            "order_by" => order_by = Some(raw),
            "ascending" => ascending = parse_bool("ascending", &raw)?,
            "batch" => options = options.batching(parse_bool("batch", &raw)?),
            "select" => options = options.select(raw),
            _ => options = options.filter(name, filter_value(raw)),
        }
    }

    if let Some(column) = order_by {
        options = options.order_by(column, ascending);
    }
    Ok(options)
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    raw.parse().map_err(|_| {
        CacheError::InvalidRequest(format!("{name} must be true or false, got '{raw}'"))
    })
}

fn filter_value(raw: String) -> Value {
    match serde_json::from_str::<Value>(&raw) {
        Ok(value @ (Value::Bool(_) | Value::Number(_) | Value::Null)) => value,
        _ => Value::String(raw),
    }
}
