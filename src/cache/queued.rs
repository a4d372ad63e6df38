//! Queued Cache Module
//!
//! The stale-while-revalidate engine. Callers go through [`QueuedCache::access`],
//! background workers through [`QueuedCache::run`]; all coordination between
//! them happens in the shared store.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::freshness::{classify, is_stale, Freshness};
use crate::cache::stats::StatsRecorder;
use crate::cache::unit::{Unit, UnitHandle, UnitSpec};
use crate::cache::{
    CacheRecord, CacheStats, CacheStore, Clock, GuardManager, GuardPhase, JobQueue, Namespace,
    RefreshJob, SystemClock,
};
use crate::error::{CacheError, Result};

/// Default age after which a guard is considered abandoned.
pub const DEFAULT_GUARD_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(600);

// == Refresh Outcome ==
/// What a background refresh ended up doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The record was stale and has been recomputed
    Refreshed,
    /// The record was already fresh; nothing was computed
    AlreadyFresh,
    /// Another job is processing this unit
    InProgress,
}

struct Inner {
    namespace: Namespace,
    store: Arc<dyn CacheStore>,
    queue: Arc<dyn JobQueue>,
    clock: Arc<dyn Clock>,
    guards: GuardManager,
    units: RwLock<HashMap<String, Arc<Unit>>>,
    stats: StatsRecorder,
}

// == Queued Cache ==
/// Registry of units sharing one namespace, store and job queue.
///
/// Cloning is cheap; clones share registrations and statistics.
#[derive(Clone)]
pub struct QueuedCache {
    inner: Arc<Inner>,
}

impl QueuedCache {
    /// Starts building a cache for `namespace`.
    pub fn builder(namespace: Namespace) -> QueuedCacheBuilder {
        QueuedCacheBuilder {
            namespace,
            store: None,
            queue: None,
            clock: Arc::new(SystemClock),
            guard_timeout: Some(DEFAULT_GUARD_TIMEOUT),
        }
    }

    /// Namespace every key of this cache is derived from.
    pub fn namespace(&self) -> &Namespace {
        &self.inner.namespace
    }

    /// Snapshot of the access and refresh counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.stats.snapshot()
    }

    // == Register ==
    /// Registers a unit and returns a handle to access it.
    ///
    /// Fails with [`CacheError::Configuration`] if the declaration is invalid
    /// or the name is already taken.
    pub fn register(&self, spec: UnitSpec) -> Result<UnitHandle> {
        let unit = spec.build()?;
        let name = unit.name.clone();

        {
            let mut units = self
                .inner
                .units
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if units.contains_key(&name) {
                return Err(CacheError::Configuration(format!(
                    "Unit '{}' is already registered",
                    name
                )));
            }
            units.insert(name.clone(), Arc::new(unit));
        }

        info!(owner = %self.inner.namespace.owner, unit = %name, "Registered unit");
        Ok(UnitHandle::new(self.clone(), name))
    }

    /// Returns a handle to an already registered unit.
    pub fn handle(&self, name: &str) -> Result<UnitHandle> {
        let unit = self.unit(name)?;
        Ok(UnitHandle::new(self.clone(), unit.name.clone()))
    }

    /// Names of all registered units, sorted.
    pub fn units(&self) -> Vec<String> {
        let units = self
            .inner
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = units.keys().cloned().collect();
        names.sort();
        names
    }

    // == Access ==
    /// Returns the results of `name`, computing or refreshing as needed.
    ///
    /// * Fresh record: returned as-is.
    /// * Stale record: returned as-is, and a background refresh is queued.
    /// * Expired or missing: served by the fallback unit (with a refresh
    ///   queued) if one is configured, otherwise computed and stored now.
    ///
    /// `force` overrides the unit's default. A forced access discards the
    /// stored record and always computes the real value.
    pub async fn access(&self, name: &str, force: Option<bool>) -> Result<Value> {
        let unit = self.unit(name)?;
        let key = self.inner.namespace.data_key(&unit.name);

        if force.unwrap_or(unit.force) {
            debug!(unit = %unit.name, "Forced access, discarding cached record");
            self.inner.store.delete(&key).await?;
            self.inner.stats.record_miss();
            return self.compute_and_store(&unit).await;
        }

        let record = self.load(&key).await?;
        let freshness = classify(record.as_ref(), self.inner.clock.now());

        match (freshness, record) {
            (Freshness::Fresh, Some(record)) => {
                debug!(unit = %unit.name, "Serving fresh record");
                self.inner.stats.record_fresh_hit();
                Ok(record.results)
            }
            (Freshness::Stale, Some(record)) => {
                debug!(unit = %unit.name, "Serving stale record");
                self.inner.stats.record_stale_hit();
                self.dispatch(&unit).await;
                Ok(record.results)
            }
            _ => self.serve_expired(&unit).await,
        }
    }

    // == Invalidate ==
    /// Deletes the stored record of `name`.
    pub async fn invalidate(&self, name: &str) -> Result<()> {
        let unit = self.unit(name)?;
        self.inner
            .store
            .delete(&self.inner.namespace.data_key(&unit.name))
            .await?;
        debug!(unit = %unit.name, "Invalidated record");
        Ok(())
    }

    /// Returns the stored record of `name`, if readable.
    pub async fn record(&self, name: &str) -> Result<Option<CacheRecord>> {
        let unit = self.unit(name)?;
        self.load(&self.inner.namespace.data_key(&unit.name)).await
    }

    // == Queue Refresh ==
    /// Queues a background refresh of `name` unless one is already queued
    /// or running.
    ///
    /// The `Queued` guard stays in place after a successful enqueue and is
    /// handed off to `Processing` when the job starts. A failed enqueue
    /// releases it. Returns whether a job was enqueued.
    pub async fn queue_refresh(&self, name: &str) -> Result<bool> {
        let unit = self.unit(name)?;
        self.queue_refresh_unit(&unit).await
    }

    // == Run ==
    /// Body of a background refresh job.
    ///
    /// Takes the unit's guard over from `Queued` to `Processing`, re-checks
    /// staleness and recomputes only if the record is still stale. The guard
    /// is released on every exit path.
    pub async fn run(&self, name: &str) -> Result<RefreshOutcome> {
        let unit = self.unit(name)?;
        let guard_key = self.inner.namespace.guard_key(&unit.name);
        let data_key = self.inner.namespace.data_key(&unit.name);

        let target: &Unit = &unit;

        let outcome = self
            .inner
            .guards
            .with_guard(&guard_key, GuardPhase::Processing, true, move || async move {
                // Another job or caller may have refreshed it since enqueue
                let record = self.load(&data_key).await?;
                if !is_stale(record.as_ref(), self.inner.clock.now()) {
                    return Ok(RefreshOutcome::AlreadyFresh);
                }
                self.compute_and_store(target).await?;
                Ok::<_, CacheError>(RefreshOutcome::Refreshed)
            })
            .await?
            .unwrap_or(RefreshOutcome::InProgress);

        match outcome {
            RefreshOutcome::Refreshed => {
                self.inner.stats.record_refresh_completed();
                info!(unit = %unit.name, "Refreshed stale record");
            }
            RefreshOutcome::AlreadyFresh | RefreshOutcome::InProgress => {
                self.inner.stats.record_refresh_skipped();
                debug!(unit = %unit.name, ?outcome, "Refresh skipped");
            }
        }
        Ok(outcome)
    }

    // == Internals ==
    fn unit(&self, name: &str) -> Result<Arc<Unit>> {
        self.inner
            .units
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::UnknownUnit(name.to_string()))
    }

    async fn load(&self, key: &str) -> Result<Option<CacheRecord>> {
        let Some(raw) = self.inner.store.read(key).await? else {
            return Ok(None);
        };

        match CacheRecord::decode(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                warn!(key, error = %err, "Discarding unreadable cache record");
                Ok(None)
            }
        }
    }

    async fn serve_expired(&self, unit: &Unit) -> Result<Value> {
        self.inner.stats.record_miss();

        let Some(fallback) = unit.fallback.as_deref() else {
            debug!(unit = %unit.name, "No usable record, computing now");
            return self.compute_and_store(unit).await;
        };

        let fallback = self.unit(fallback)?;
        debug!(unit = %unit.name, fallback = %fallback.name, "No usable record, serving fallback");
        self.dispatch(unit).await;

        match fallback.compute().await {
            Ok(results) => {
                self.inner.stats.record_fallback();
                Ok(results)
            }
            Err(err) => {
                self.inner.stats.record_computation_failure();
                Err(err)
            }
        }
    }

    /// Computes the real value and overwrites the stored record.
    async fn compute_and_store(&self, unit: &Unit) -> Result<Value> {
        // Offsets count from when the computation runs
        let now = self.inner.clock.now();

        let results = match unit.compute().await {
            Ok(results) => results,
            Err(err) => {
                self.inner.stats.record_computation_failure();
                warn!(unit = %unit.name, error = %err, "Computation failed");
                return Err(err);
            }
        };

        let record = CacheRecord::computed(results, now, unit.stale_in, unit.expires_in);
        self.inner
            .store
            .write(&self.inner.namespace.data_key(&unit.name), &record.encode()?)
            .await?;
        self.inner.stats.record_computation();

        Ok(record.results)
    }

    /// Queues a refresh without letting dispatch failures reach the caller.
    async fn dispatch(&self, unit: &Unit) {
        if let Err(err) = self.queue_refresh_unit(unit).await {
            warn!(unit = %unit.name, error = %err, "Failed to queue refresh");
        }
    }

    async fn queue_refresh_unit(&self, unit: &Unit) -> Result<bool> {
        let guard_key = self.inner.namespace.guard_key(&unit.name);
        let job = RefreshJob {
            namespace: self.inner.namespace.clone(),
            unit: unit.name.clone(),
            enqueued_at: self.inner.clock.now(),
        };

        let queue = self.inner.queue.clone();

        let enqueued = self
            .inner
            .guards
            .with_guard(&guard_key, GuardPhase::Queued, false, move || async move {
                queue.enqueue(job).await
            })
            .await?;

        if enqueued.is_some() {
            self.inner.stats.record_enqueued();
            debug!(unit = %unit.name, "Refresh queued");
            Ok(true)
        } else {
            self.inner.stats.record_suppressed();
            debug!(unit = %unit.name, "Refresh already pending");
            Ok(false)
        }
    }
}

impl fmt::Debug for QueuedCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedCache")
            .field("namespace", &self.inner.namespace)
            .field("units", &self.units())
            .finish_non_exhaustive()
    }
}

// == Builder ==
/// Assembles a [`QueuedCache`] from its collaborators.
pub struct QueuedCacheBuilder {
    namespace: Namespace,
    store: Option<Arc<dyn CacheStore>>,
    queue: Option<Arc<dyn JobQueue>>,
    clock: Arc<dyn Clock>,
    guard_timeout: Option<std::time::Duration>,
}

impl QueuedCacheBuilder {
    /// Store holding records and guards. Required.
    pub fn store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Job queue receiving refresh jobs. Required.
    pub fn queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    /// Time source, wall clock by default.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Age after which a held guard may be taken over. `None` trusts guards
    /// forever.
    pub fn guard_timeout(mut self, timeout: Option<std::time::Duration>) -> Self {
        self.guard_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<QueuedCache> {
        let store = self
            .store
            .ok_or_else(|| CacheError::Configuration("A cache store is required".to_string()))?;
        let queue = self
            .queue
            .ok_or_else(|| CacheError::Configuration("A job queue is required".to_string()))?;
        let guard_timeout = self
            .guard_timeout
            .map(chrono::Duration::from_std)
            .transpose()
            .map_err(|_| CacheError::Configuration("Guard timeout out of range".to_string()))?;

        let guards = GuardManager::new(store.clone(), self.clock.clone(), guard_timeout);

        Ok(QueuedCache {
            inner: Arc::new(Inner {
                namespace: self.namespace,
                store,
                queue,
                clock: self.clock,
                guards,
                units: RwLock::new(HashMap::new()),
                stats: StatsRecorder::default(),
            }),
        })
    }
}
