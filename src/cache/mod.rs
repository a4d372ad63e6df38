//! Cache Module
//!
//! Stale-while-revalidate caching of registered computations, with
//! background refresh and guard keys preventing duplicate refreshes.

mod clock;
pub mod freshness;
mod guard;
mod keys;
mod queue;
mod queued;
mod record;
mod stats;
mod store;
mod unit;

#[cfg(test)]
mod property_tests;

// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use freshness::Freshness;
pub use guard::{GuardLease, GuardManager};
pub use keys::Namespace;
pub use queue::{ChannelQueue, JobQueue, RefreshJob};
pub use queued::{QueuedCache, QueuedCacheBuilder, RefreshOutcome, DEFAULT_GUARD_TIMEOUT};
pub use record::{CacheRecord, GuardPhase, GuardRecord};
pub use stats::CacheStats;
pub use store::{CacheStore, MemoryStore};
pub use unit::{Computation, UnitHandle, UnitSpec};

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Maximum allowed value size in bytes
pub const MAX_VALUE_SIZE: usize = 1024 * 1024; // 1 MB
