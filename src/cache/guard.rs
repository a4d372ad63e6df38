//! Guard Module
//!
//! Claim-run-release over a guard key so that at most one refresh of a unit
//! is queued or running at any time.
//!
//! A guard slot moves through `absent -> Queued -> Processing -> absent`.
//! Every transition is a compare-and-swap against the store, so two callers
//! can never both believe they own the same slot.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Duration;
use tracing::{debug, warn};

use crate::cache::{CacheStore, Clock, GuardPhase, GuardRecord};
use crate::error::Result;

static NEXT_HOLDER: AtomicU64 = AtomicU64::new(1);

fn next_holder() -> String {
    format!(
        "{}-{}",
        std::process::id(),
        NEXT_HOLDER.fetch_add(1, Ordering::Relaxed)
    )
}

// == Guard Manager ==
/// Claims and releases guard keys in a shared store.
#[derive(Clone)]
pub struct GuardManager {
    store: Arc<dyn CacheStore>,
    clock: Arc<dyn Clock>,
    /// Age after which a held guard is treated as abandoned
    timeout: Option<Duration>,
}

impl GuardManager {
    // == Constructor ==
    /// Creates a guard manager.
    ///
    /// # Arguments
    /// * `store` - Store holding the guard keys
    /// * `clock` - Time source for guard timestamps
    /// * `timeout` - Optional age after which a guard may be taken over
    pub fn new(
        store: Arc<dyn CacheStore>,
        clock: Arc<dyn Clock>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            clock,
            timeout,
        }
    }

    // == Current ==
    /// Returns the guard currently held under `key`, if any.
    pub async fn current(&self, key: &str) -> Result<Option<GuardRecord>> {
        match self.store.read(key).await? {
            Some(raw) => Ok(Some(GuardRecord::decode(&raw)?)),
            None => Ok(None),
        }
    }

    // == Claim ==
    /// Attempts to take the guard under `key` for `phase`.
    ///
    /// The claim succeeds when the slot is absent, when a `Queued` guard is
    /// handed off to `Processing`, or when the held guard is older than the
    /// configured timeout. Returns `None` when another holder keeps it.
    pub async fn claim(&self, key: &str, phase: GuardPhase) -> Result<Option<GuardLease>> {
        let now = self.clock.now();
        let record = GuardRecord::new(phase, now, next_holder());
        let token = record.encode()?;

        let current = self.store.read(key).await?;
        let expected = match current.as_deref() {
            None => None,
            Some(raw) => match GuardRecord::decode(raw) {
                Ok(held) if held.is_abandoned(now, self.timeout) => {
                    warn!(
                        key,
                        phase = ?held.phase,
                        started = %held.started,
                        "Taking over abandoned guard"
                    );
                    Some(raw)
                }
                Ok(held) if held.phase == GuardPhase::Queued && phase == GuardPhase::Processing => {
                    Some(raw)
                }
                _ => {
                    debug!(key, ?phase, "Guard already held");
                    return Ok(None);
                }
            },
        };

        if !self
            .store
            .compare_and_swap(key, expected, Some(&token))
            .await?
        {
            debug!(key, ?phase, "Lost guard race");
            return Ok(None);
        }

        debug!(key, ?phase, "Guard claimed");
        Ok(Some(GuardLease {
            store: self.store.clone(),
            key: key.to_string(),
            token,
            armed: true,
        }))
    }

    // == With Guard ==
    /// Runs `body` only if the guard under `key` can be claimed.
    ///
    /// A failing body always releases the guard. A succeeding body releases
    /// it only when `clear_on_exit` is true; otherwise the guard stays in
    /// place for a later stage to take over.
    ///
    /// Returns `Ok(None)` when the guard was held elsewhere and `body` did
    /// not run.
    pub async fn with_guard<T, F, Fut>(
        &self,
        key: &str,
        phase: GuardPhase,
        clear_on_exit: bool,
        body: F,
    ) -> Result<Option<T>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(lease) = self.claim(key, phase).await? else {
            return Ok(None);
        };

        match body().await {
            Ok(value) => {
                if clear_on_exit {
                    if let Err(err) = lease.release().await {
                        warn!(key, error = %err, "Failed to release guard");
                    }
                } else {
                    lease.keep();
                }
                Ok(Some(value))
            }
            Err(err) => {
                if let Err(release_err) = lease.release().await {
                    warn!(key, error = %release_err, "Failed to release guard");
                }
                Err(err)
            }
        }
    }
}

// == Guard Lease ==
/// Ownership of a claimed guard.
///
/// Dropping a lease that was neither released nor kept (panic, cancelled
/// future) schedules its release on the current tokio runtime.
#[must_use = "dropping a lease schedules its release"]
pub struct GuardLease {
    store: Arc<dyn CacheStore>,
    key: String,
    token: String,
    armed: bool,
}

impl GuardLease {
    /// The guard key this lease holds.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Removes the guard, unless it has since been replaced by another holder.
    pub async fn release(mut self) -> Result<()> {
        let released = self
            .store
            .compare_and_swap(&self.key, Some(&self.token), None)
            .await?;
        self.armed = false;

        if !released {
            debug!(key = %self.key, "Guard already replaced, nothing to release");
        }
        Ok(())
    }

    /// Leaves the guard in place for a later stage to take over.
    pub fn keep(mut self) {
        self.armed = false;
    }
}

impl Drop for GuardLease {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!(key = %key, "Guard dropped while held, releasing");
                handle.spawn(async move {
                    if let Err(err) = store.compare_and_swap(&key, Some(&token), None).await {
                        warn!(key = %key, error = %err, "Failed to release dropped guard");
                    }
                });
            }
            Err(_) => {
                warn!(key = %key, "Guard dropped outside a runtime, left in place");
            }
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ManualClock, MemoryStore};
    use crate::error::CacheError;
    use chrono::{TimeZone, Utc};

    const KEY: &str = "owner@v1/report:guard";

    fn setup(timeout: Option<Duration>) -> (Arc<MemoryStore>, Arc<ManualClock>, GuardManager) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(Utc.timestamp_opt(0, 0).unwrap()));
        let guards = GuardManager::new(store.clone(), clock.clone(), timeout);
        (store, clock, guards)
    }

    #[tokio::test]
    async fn test_second_claim_is_refused() {
        let (_, _, guards) = setup(None);

        let first = guards.claim(KEY, GuardPhase::Queued).await.unwrap();
        assert!(first.is_some());
        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_none());

        first.unwrap().release().await.unwrap();
        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_queued_hands_off_to_processing() {
        let (_, _, guards) = setup(None);

        guards
            .claim(KEY, GuardPhase::Queued)
            .await
            .unwrap()
            .unwrap()
            .keep();

        let processing = guards.claim(KEY, GuardPhase::Processing).await.unwrap();
        assert!(processing.is_some());
        let held = guards.current(KEY).await.unwrap().unwrap();
        assert_eq!(held.phase, GuardPhase::Processing);

        // Neither stage may start while processing
        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_none());
        assert!(guards
            .claim(KEY, GuardPhase::Processing)
            .await
            .unwrap()
            .is_none());

        processing.unwrap().release().await.unwrap();
        assert!(guards.current(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_abandoned_guard_is_taken_over() {
        let (_, clock, guards) = setup(Some(Duration::seconds(600)));

        guards
            .claim(KEY, GuardPhase::Processing)
            .await
            .unwrap()
            .unwrap()
            .keep();

        clock.advance(Duration::seconds(600));
        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_none());

        clock.advance(Duration::seconds(1));
        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_release_leaves_foreign_guard() {
        let (store, clock, guards) = setup(Some(Duration::seconds(10)));

        let stale_lease = guards.claim(KEY, GuardPhase::Processing).await.unwrap().unwrap();
        clock.advance(Duration::seconds(11));
        let fresh_lease = guards.claim(KEY, GuardPhase::Processing).await.unwrap().unwrap();

        stale_lease.release().await.unwrap();
        assert!(store.read(KEY).await.unwrap().is_some());

        fresh_lease.release().await.unwrap();
        assert!(store.read(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unreadable_guard_counts_as_held() {
        let (store, _, guards) = setup(None);
        store.write(KEY, "locked").await.unwrap();

        assert!(guards.claim(KEY, GuardPhase::Queued).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_guard_clears_on_exit() {
        let (store, _, guards) = setup(None);

        let ran = guards
            .with_guard(KEY, GuardPhase::Processing, true, || async { Ok(7) })
            .await
            .unwrap();

        assert_eq!(ran, Some(7));
        assert!(store.read(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_with_guard_keeps_when_not_clearing() {
        let (_, _, guards) = setup(None);

        let ran = guards
            .with_guard(KEY, GuardPhase::Queued, false, || async { Ok(()) })
            .await
            .unwrap();
        assert!(ran.is_some());

        let skipped = guards
            .with_guard(KEY, GuardPhase::Queued, false, || async { Ok(()) })
            .await
            .unwrap();
        assert!(skipped.is_none());
    }

    #[tokio::test]
    async fn test_with_guard_releases_on_error() {
        let (store, _, guards) = setup(None);

        let result: Result<Option<()>> = guards
            .with_guard(KEY, GuardPhase::Queued, false, || async {
                Err(CacheError::Queue("queue closed".into()))
            })
            .await;

        assert!(matches!(result, Err(CacheError::Queue(_))));
        assert!(store.read(KEY).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_body_releases_guard() {
        let (store, _, guards) = setup(None);

        let pending = guards.with_guard(KEY, GuardPhase::Processing, true, || async {
            std::future::pending::<Result<()>>().await
        });
        let timed_out =
            tokio::time::timeout(std::time::Duration::from_millis(20), pending).await;
        assert!(timed_out.is_err());

        // Let the release spawned on drop run
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(store.read(KEY).await.unwrap().is_none());
    }
}
