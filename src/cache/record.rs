//! Record Module
//!
//! Defines the values written to the cache store: the cached results of a
//! computation and the guard markers protecting its refresh.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

// == Cache Record ==
/// The stored outcome of a successful computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
    /// Payload produced by the computation
    pub results: Value,
    /// Soft deadline, None = never stale by time
    pub stale_at: Option<DateTime<Utc>>,
    /// Hard deadline, None = never expires by time
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record for results computed at `now`.
    ///
    /// A deadline past the representable range is left unset.
    ///
    /// # Arguments
    /// * `results` - The computed payload
    /// * `now` - The moment the computation ran
    /// * `stale_in` - Optional offset after which the record is stale
    /// * `expires_in` - Optional offset after which the record is expired
    pub fn computed(
        results: Value,
        now: DateTime<Utc>,
        stale_in: Option<Duration>,
        expires_in: Option<Duration>,
    ) -> Self {
        Self {
            results,
            stale_at: stale_in.and_then(|offset| now.checked_add_signed(offset)),
            expires_at: expires_in.and_then(|offset| now.checked_add_signed(offset)),
        }
    }

    /// Encodes the record for the store.
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a record previously written by [`CacheRecord::encode`].
    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}

// == Guard Phase ==
/// Which stage of a refresh a guard is protecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardPhase {
    /// A refresh job sits in the queue and has not started yet
    Queued,
    /// A refresh job is running
    Processing,
}

// == Guard Record ==
/// Marker written under a guard key while an operation holds it.
///
/// Only its presence matters for locking; the contents are used for the
/// queued to processing hand-off and for spotting abandoned guards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRecord {
    pub phase: GuardPhase,
    pub started: DateTime<Utc>,
    /// Distinguishes two claims made at the same instant
    pub holder: String,
}

impl GuardRecord {
    pub fn new(phase: GuardPhase, started: DateTime<Utc>, holder: impl Into<String>) -> Self {
        Self {
            phase,
            started,
            holder: holder.into(),
        }
    }

    /// Returns true if the guard was taken more than `timeout` before `now`.
    ///
    /// A timeout reaching past the representable range never elapses.
    pub fn is_abandoned(&self, now: DateTime<Utc>, timeout: Option<Duration>) -> bool {
        timeout
            .and_then(|timeout| self.started.checked_add_signed(timeout))
            .map_or(false, |deadline| deadline < now)
    }

    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
