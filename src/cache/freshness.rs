//! Freshness Module
//!
//! Classifies a cached record as fresh, stale or expired relative to a given
//! instant. Expired always implies stale; the reverse does not hold.

use chrono::{DateTime, Utc};

use crate::cache::CacheRecord;

/// Temporal state of a cache slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Within its validity window; return as-is
    Fresh,
    /// Past `stale_at` but not expired; return and refresh in the background
    Stale,
    /// Past `expires_at` or absent; must be replaced before returning
    Expired,
}

/// Returns true if there is no record or its hard deadline has passed.
pub fn is_expired(record: Option<&CacheRecord>, now: DateTime<Utc>) -> bool {
    match record {
        None => true,
        Some(record) => record.expires_at.is_some_and(|expires| expires < now),
    }
}

/// Returns true if the record is expired or its soft deadline has passed.
pub fn is_stale(record: Option<&CacheRecord>, now: DateTime<Utc>) -> bool {
    if is_expired(record, now) {
        return true;
    }
    record
        .and_then(|record| record.stale_at)
        .is_some_and(|stale| stale < now)
}

/// Classifies `record` at `now`.
pub fn classify(record: Option<&CacheRecord>, now: DateTime<Utc>) -> Freshness {
    if is_expired(record, now) {
        Freshness::Expired
    } else if is_stale(record, now) {
        Freshness::Stale
    } else {
        Freshness::Fresh
    }
}
