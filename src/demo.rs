//! Demo Units
//!
//! Units served by the bundled HTTP server. Their computations are cheap
//! stand-ins with configurable latency so the fresh / stale / expired
//! lifecycle can be observed from the outside.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;

use crate::cache::{QueuedCache, UnitSpec};
use crate::config::Config;
use crate::error::{BoxError, Result};

/// Results of the `clock` unit.
#[derive(Debug, Clone, Serialize)]
pub struct ClockReading {
    /// When the reading was computed, None for previews
    pub computed_at: Option<String>,
    /// How many real computations have run so far
    pub sequence: u64,
    pub preview: bool,
}

/// Registers `clock`, its `clock_preview` fallback and `uptime`.
pub fn register_demo_units(cache: &QueuedCache, config: &Config) -> Result<()> {
    let latency = Duration::from_millis(config.demo_latency_ms);
    let sequence = Arc::new(AtomicU64::new(0));

    let counter = sequence.clone();
    let mut clock = UnitSpec::new("clock", move || {
        let counter = counter.clone();
        async move {
            tokio::time::sleep(latency).await;
            Ok::<_, BoxError>(ClockReading {
                computed_at: Some(Utc::now().to_rfc3339()),
                sequence: counter.fetch_add(1, Ordering::SeqCst) + 1,
                preview: false,
            })
        }
    })
    .fallback("clock_preview");
    clock = with_offsets(clock, config);
    cache.register(clock)?;

    cache.register(UnitSpec::new("clock_preview", move || {
        let sequence = sequence.load(Ordering::SeqCst);
        async move {
            Ok::<_, BoxError>(ClockReading {
                computed_at: None,
                sequence,
                preview: true,
            })
        }
    }))?;

    let started = Instant::now();
    cache.register(with_offsets(
        UnitSpec::new("uptime", move || {
            let uptime = started.elapsed().as_secs();
            async move {
                tokio::time::sleep(latency).await;
                Ok::<_, BoxError>(uptime)
            }
        }),
        config,
    ))?;

    Ok(())
}

fn with_offsets(mut spec: UnitSpec, config: &Config) -> UnitSpec {
    if let Some(expires_in) = config.expires_in() {
        spec = spec.expires_in(expires_in);
    }
    if let Some(stale_in) = config.stale_in() {
        spec = spec.stale_in(stale_in);
    }
    spec
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ChannelQueue, MemoryStore, Namespace};

    fn demo_cache() -> QueuedCache {
        let (queue, _receiver) = ChannelQueue::new(8);
        QueuedCache::builder(Namespace::new("demo", "v1"))
            .store(Arc::new(MemoryStore::new()))
            .queue(Arc::new(queue))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_demo_units_registered() {
        let cache = demo_cache();
        register_demo_units(&cache, &Config::default()).unwrap();

        assert_eq!(cache.units(), vec!["clock", "clock_preview", "uptime"]);
    }

    #[tokio::test]
    async fn test_clock_serves_preview_first() {
        let cache = demo_cache();
        let config = Config {
            demo_latency_ms: 0,
            ..Config::default()
        };
        register_demo_units(&cache, &config).unwrap();

        let first = cache.access("clock", None).await.unwrap();
        assert_eq!(first["preview"], true);

        let forced = cache.access("clock", Some(true)).await.unwrap();
        assert_eq!(forced["preview"], false);
        assert_eq!(forced["sequence"], 1);
    }
}
