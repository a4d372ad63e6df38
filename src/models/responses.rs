//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheStats, Namespace};

/// Response body for the access operation (GET /units/:name)
#[derive(Debug, Clone, Serialize)]
pub struct AccessResponse {
    /// The requested unit
    pub unit: String,
    /// The unit's results
    pub results: Value,
}

impl AccessResponse {
    /// Creates a new AccessResponse
    pub fn new(unit: impl Into<String>, results: Value) -> Self {
        Self {
            unit: unit.into(),
            results,
        }
    }
}

/// Response body for the invalidate operation (DELETE /units/:name)
#[derive(Debug, Clone, Serialize)]
pub struct InvalidateResponse {
    /// Success message
    pub message: String,
    /// The unit whose record was dropped
    pub unit: String,
}

impl InvalidateResponse {
    /// Creates a new InvalidateResponse
    pub fn new(unit: impl Into<String>) -> Self {
        let unit = unit.into();
        Self {
            message: format!("Unit '{}' invalidated successfully", unit),
            unit,
        }
    }
}

/// Response body for the unit listing (GET /units)
#[derive(Debug, Clone, Serialize)]
pub struct UnitsResponse {
    pub owner: String,
    pub version: String,
    pub units: Vec<String>,
}

impl UnitsResponse {
    pub fn new(namespace: &Namespace, units: Vec<String>) -> Self {
        Self {
            owner: namespace.owner.clone(),
            version: namespace.version.clone(),
            units,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: CacheStats,
    /// Share of accesses answered from a stored record
    pub hit_rate: f64,
}

impl StatsResponse {
    /// Creates a new StatsResponse from cache statistics
    pub fn new(stats: CacheStats) -> Self {
        Self {
            hit_rate: stats.hit_rate(),
            stats,
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
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
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
