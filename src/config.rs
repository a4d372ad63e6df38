//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Identity of the object owning the demo units
    pub cache_owner: String,
    /// Version marker; bump it to invalidate every cached record
    pub cache_version: String,
    /// Seconds after which a held guard is considered abandoned, 0 = never
    pub guard_timeout: u64,
    /// Maximum number of refresh jobs waiting in the queue
    pub queue_capacity: usize,
    /// Seconds until a computed record expires, 0 = never
    pub default_expires_in: u64,
    /// Seconds until a computed record turns stale, 0 = never
    pub default_stale_in: u64,
    /// Simulated latency of the demo computations in milliseconds
    pub demo_latency_ms: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_OWNER` - Owner identity for cache keys (default: "demo")
    /// - `CACHE_VERSION` - Version marker for cache keys (default: "v1")
    /// - `GUARD_TIMEOUT` - Abandoned guard age in seconds (default: 600)
    /// - `QUEUE_CAPACITY` - Pending refresh job limit (default: 1024)
    /// - `DEFAULT_EXPIRES_IN` - Record expiry in seconds (default: 3600)
    /// - `DEFAULT_STALE_IN` - Record staleness in seconds (default: 2700)
    /// - `DEMO_LATENCY_MS` - Demo computation latency (default: 250)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            cache_owner: env::var("CACHE_OWNER").unwrap_or(defaults.cache_owner),
            cache_version: env::var("CACHE_VERSION").unwrap_or(defaults.cache_version),
            guard_timeout: parse_env("GUARD_TIMEOUT").unwrap_or(defaults.guard_timeout),
            queue_capacity: parse_env("QUEUE_CAPACITY").unwrap_or(defaults.queue_capacity),
            default_expires_in: parse_env("DEFAULT_EXPIRES_IN")
                .unwrap_or(defaults.default_expires_in),
            default_stale_in: parse_env("DEFAULT_STALE_IN").unwrap_or(defaults.default_stale_in),
            demo_latency_ms: parse_env("DEMO_LATENCY_MS").unwrap_or(defaults.demo_latency_ms),
        }
    }

    /// Guard timeout as a duration, None when disabled.
    pub fn guard_timeout(&self) -> Option<Duration> {
        seconds(self.guard_timeout)
    }

    /// Record expiry offset, None when disabled.
    pub fn expires_in(&self) -> Option<Duration> {
        seconds(self.default_expires_in)
    }

    /// Record staleness offset, None when disabled.
    pub fn stale_in(&self) -> Option<Duration> {
        seconds(self.default_stale_in)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_owner: "demo".to_string(),
            cache_version: "v1".to_string(),
            guard_timeout: 600,
            queue_capacity: 1024,
            default_expires_in: 3600,
            default_stale_in: 2700,
            demo_latency_ms: 250,
        }
    }
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}
