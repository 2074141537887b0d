//! Error types for the cache layer
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Boxed error returned by fetch functions and query executors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reference-counted error, shared between every caller awaiting the same fetch.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

// == Cache Error Enum ==
/// Unified error type for the cache layer.
///
/// Cloneable so one fetch outcome can be handed to every concurrent waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// The origin fetch failed and no cached entry (fresh or stale) exists.
    /// `source` is the error produced by the fetch function, untouched.
    #[error("Fetch failed for key '{key}': {source}")]
    Fetch {
        key: String,
        #[source]
        source: SharedError,
    },

    /// Payload could not be serialized for size accounting or conversion
    #[error("Serialization error for key '{key}': {message}")]
    Serialization { key: String, message: String },

    /// Payload alone exceeds the configured byte budget
    #[error("Entry '{key}' is {size} bytes, larger than the cache limit of {max_size} bytes")]
    EntryTooLarge {
        key: String,
        size: usize,
        max_size: usize,
    },

    /// Invalidation pattern could not be compiled
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Batch flush dropped a pending request without answering it
    #[error("Batched query for '{0}' was dropped before completion")]
    BatchAborted(String),
}

impl CacheError {
    /// Wraps an arbitrary fetch error for `key`.
    ///
    /// A `CacheError::Fetch` coming back from a nested layer is unwrapped so
    /// `source` stays the error produced at the origin.
    pub fn fetch(key: impl Into<String>, source: impl Into<BoxError>) -> Self {
        let source: SharedError = match source.into().downcast::<CacheError>() {
            Ok(nested) => match *nested {
                CacheError::Fetch { source, .. } => source,
                other => Arc::new(other),
            },
            Err(other) => Arc::from(other),
        };
        CacheError::Fetch {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn serialization(key: impl Into<String>, err: serde_json::Error) -> Self {
        CacheError::Serialization {
            key: key.into(),
            message: err.to_string(),
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Fetch { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Serialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            CacheError::InvalidPattern(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::BatchAborted(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache layer.
pub type Result<T> = std::result::Result<T, CacheError>;
