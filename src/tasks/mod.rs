//! Background Tasks Module
//!
//! Contains background tasks that run alongside the cache.
//!
//! # Tasks
//! - Refresh worker: executes queued refresh jobs

mod refresh;

pub use refresh::spawn_refresh_worker;
