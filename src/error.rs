//! Error types for the queued cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

/// Boxed error produced by a registered computation.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

// == Cache Error Enum ==
/// Unified error type for the queued cache.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A real or fallback computation failed
    #[error("Computation '{unit}' failed: {source}")]
    Computation {
        unit: String,
        #[source]
        source: BoxError,
    },

    /// A unit was registered with an invalid configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// No unit registered under the given name
    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    /// The cache store adapter failed
    #[error("Store error: {0}")]
    Store(String),

    /// The job queue adapter refused or lost a job
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A record could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CacheError {
    /// Wraps a computation failure with the name of the unit that raised it.
    pub fn computation(unit: impl Into<String>, source: BoxError) -> Self {
        CacheError::Computation {
            unit: unit.into(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::UnknownUnit(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) | CacheError::Configuration(_) => {
                StatusCode::BAD_REQUEST
            }
            CacheError::Computation { .. } => StatusCode::BAD_GATEWAY,
            CacheError::Queue(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Store(_) | CacheError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the queued cache.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_computation_error_keeps_source() {
        let err = CacheError::computation("report", "database offline".into());
        assert_eq!(
            err.to_string(),
            "Computation 'report' failed: database offline"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CacheError::UnknownUnit("x".into()), StatusCode::NOT_FOUND),
            (
                CacheError::Configuration("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                CacheError::computation("x", "boom".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                CacheError::Queue("x".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                CacheError::Store("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
