//! Queued Cache - stale-while-revalidate caching of expensive computations
//!
//! Registered units are served from a shared store, refreshed in the
//! background once stale, and guarded so that at most one refresh per unit
//! is ever queued or running.

pub mod api;
pub mod cache;
pub mod config;
pub mod demo;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{QueuedCache, UnitHandle, UnitSpec};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_refresh_worker;
