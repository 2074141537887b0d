//! Response DTOs for the diagnostics API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;
use crate::query::{InvalidationReport, OptimizerStats};

/// Response body for GET /stats
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub cache: CacheStats,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
    pub max_size: usize,
    pub max_entries: usize,
    pub auth_entries: usize,
    pub optimizer: OptimizerStats,
}

impl StatsResponse {
    pub fn new(
        cache: CacheStats,
        max_size: usize,
        max_entries: usize,
        auth_entries: usize,
        optimizer: OptimizerStats,
    ) -> Self {
        Self {
            hit_rate: cache.hit_rate(),
            cache,
            max_size,
            max_entries,
            auth_entries,
            optimizer,
        }
    }
}

/// Response body for GET /collections/:name
#[derive(Debug, Clone, Serialize)]
pub struct CollectionResponse {
    pub collection: String,
    pub count: usize,
    pub rows: Vec<Value>,
}

impl CollectionResponse {
    pub fn new(collection: impl Into<String>, rows: Vec<Value>) -> Self {
        Self {
            collection: collection.into(),
            count: rows.len(),
            rows,
        }
    }
}

/// Response body for POST /invalidate
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: InvalidationReport,
}

impl From<InvalidationReport> for InvalidateResponse {
    fn from(report: InvalidationReport) -> Self {
        Self {
            message: format!(
                "Invalidated {} entries after {} on '{}'",
                report.removed, report.operation, report.collection
            ),
            report,
        }
    }
}

/// Response body for POST /invalidate/pattern and DELETE /cache
#[derive(Debug, Clone, Serialize)]
pub struct RemovedResponse {
    /// Pattern that was matched, absent for a full clear
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    pub removed: usize,
}

impl RemovedResponse {
    pub fn pattern(pattern: impl Into<String>, removed: usize) -> Self {
        Self {
            pattern: Some(pattern.into()),
            removed,
        }
    }

    pub fn cleared(removed: usize) -> Self {
        Self {
            pattern: None,
            removed,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
    pub entries: usize,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy(entries: usize) -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            entries,
        }
    }
}

/// Error response body for all error conditions
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Error message describing what went wrong
    pub error: String,
}

impl ErrorResponse {
    /// Creates a new ErrorResponse
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::MutationKind;

    #[test]
    fn test_stats_response_hit_rate() {
        let cache = CacheStats {
            hits: 80,
            misses: 20,
            ..CacheStats::default()
        };
        let resp = StatsResponse::new(cache, 1024, 10, 0, OptimizerStats::default());
        assert!((resp.hit_rate - 0.8).abs() < 0.001);
    }

    #[test]
    fn test_stats_response_zero_requests() {
        let resp = StatsResponse::new(CacheStats::default(), 0, 0, 0, OptimizerStats::default());
        assert_eq!(resp.hit_rate, 0.0);
    }

    #[test]
    fn test_invalidate_response_flattens_report() {
        let resp = InvalidateResponse::from(InvalidationReport {
            collection: "blog_posts".to_string(),
            operation: MutationKind::Update,
            id: Some("7".to_string()),
            prefixes: vec!["blog_posts:".to_string()],
            removed: 3,
        });
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["removed"], 3);
        assert_eq!(json["operation"], "update");
        assert!(json["message"].as_str().unwrap().contains("blog_posts"));
    }

    #[test]
    fn test_removed_response_omits_missing_pattern() {
        let json = serde_json::to_string(&RemovedResponse::cleared(4)).unwrap();
        assert_eq!(json, r#"{"removed":4}"#);
    }

    #[test]
    fn test_health_response_serialize() {
        let resp = HealthResponse::healthy(0);
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("timestamp"));
    }

    #[test]
    fn test_error_response_serialize() {
        let resp = ErrorResponse::new("Something went wrong");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("error"));
        assert!(json.contains("Something went wrong"));
    }
}
