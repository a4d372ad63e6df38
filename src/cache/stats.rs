//! Cache Statistics Module
//!
//! Tracks how accesses were served and what happened to background refreshes.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Point-in-time snapshot of cache activity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Accesses answered from a fresh record
    pub fresh_hits: u64,
    /// Accesses answered from a stale record
    pub stale_hits: u64,
    /// Accesses that found no usable record
    pub misses: u64,
    /// Misses answered by a fallback unit
    pub fallbacks_served: u64,
    /// Real computations that completed and were stored
    pub computations: u64,
    /// Real or fallback computations that failed
    pub computation_failures: u64,
    /// Refresh jobs handed to the job queue
    pub refreshes_enqueued: u64,
    /// Refresh dispatches skipped because a refresh was already pending
    pub refreshes_suppressed: u64,
    /// Refresh jobs that recomputed a stale record
    pub refreshes_completed: u64,
    /// Refresh jobs that found nothing to do
    pub refreshes_skipped: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the share of accesses answered from the store.
    ///
    /// Returns (fresh_hits + stale_hits) / total accesses, or 0.0 if no
    /// access has been made.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.fresh_hits + self.stale_hits;
        let total = hits + self.misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by every clone of a cache.
#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    fallbacks_served: AtomicU64,
    computations: AtomicU64,
    computation_failures: AtomicU64,
    refreshes_enqueued: AtomicU64,
    refreshes_suppressed: AtomicU64,
    refreshes_completed: AtomicU64,
    refreshes_skipped: AtomicU64,
}

macro_rules! recorders {
    ($($method:ident => $field:ident),* $(,)?) => {
        $(
            pub fn $method(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl StatsRecorder {
    recorders! {
        record_fresh_hit => fresh_hits,
        record_stale_hit => stale_hits,
        record_miss => misses,
        record_fallback => fallbacks_served,
        record_computation => computations,
        record_computation_failure => computation_failures,
        record_enqueued => refreshes_enqueued,
        record_suppressed => refreshes_suppressed,
        record_refresh_completed => refreshes_completed,
        record_refresh_skipped => refreshes_skipped,
    }

    // == Snapshot ==
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            fresh_hits: self.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.stale_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            fallbacks_served: self.fallbacks_served.load(Ordering::Relaxed),
            computations: self.computations.load(Ordering::Relaxed),
            computation_failures: self.computation_failures.load(Ordering::Relaxed),
            refreshes_enqueued: self.refreshes_enqueued.load(Ordering::Relaxed),
            refreshes_suppressed: self.refreshes_suppressed.load(Ordering::Relaxed),
            refreshes_completed: self.refreshes_completed.load(Ordering::Relaxed),
            refreshes_skipped: self.refreshes_skipped.load(Ordering::Relaxed),
        }
    }
}
