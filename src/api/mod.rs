//! API Module
//!
//! HTTP handlers and routing for the cache server REST API.
//!
//! # Endpoints
//! - `GET /units` - List registered units
//! - `GET /units/:name` - Access a unit's results (`?force=true` recomputes)
//! - `DELETE /units/:name` - Drop a unit's cached record
//! - `GET /stats` - Get cache statistics
//! - `GET /health` - Health check endpoint

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
