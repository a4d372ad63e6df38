//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming query parameters.

use serde::Deserialize;

/// Query string of the access operation (GET /units/:name)
///
/// # Fields
/// - `force`: Discard the cached record and compute now; the unit's
///   configured default applies when absent
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessQuery {
    #[serde(default)]
    pub force: Option<bool>,
}
