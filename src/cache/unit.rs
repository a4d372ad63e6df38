//! Unit Module
//!
//! Registration surface: a named computation together with its fallback,
//! freshness offsets and default `force` flag.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::cache::QueuedCache;
use crate::error::{BoxError, CacheError, Result};

/// Type-erased computation producing a unit's payload.
pub type Computation =
    Arc<dyn Fn() -> BoxFuture<'static, std::result::Result<Value, BoxError>> + Send + Sync>;

// == Unit Spec ==
/// Declaration of a cached computation, consumed by [`QueuedCache::register`].
///
/// The computation takes no arguments: everything it depends on must be
/// captured by the closure and reflected in the cache namespace version.
pub struct UnitSpec {
    name: String,
    computation: Computation,
    fallback: Option<String>,
    expires_in: Option<Duration>,
    stale_in: Option<Duration>,
    force: bool,
}

impl UnitSpec {
    // == Constructor ==
    /// Declares a unit named `name` computed by `computation`.
    pub fn new<F, Fut, T, E>(name: impl Into<String>, computation: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
        T: Serialize + 'static,
        E: Into<BoxError> + 'static,
    {
        let computation: Computation = Arc::new(move || {
            let pending = computation();
            async move {
                let result: std::result::Result<Value, BoxError> = match pending.await {
                    Ok(value) => serde_json::to_value(value).map_err(BoxError::from),
                    Err(err) => Err(err.into()),
                };
                result
            }
            .boxed()
        });

        Self {
            name: name.into(),
            computation,
            fallback: None,
            expires_in: None,
            stale_in: None,
            force: false,
        }
    }

    /// Unit returned, uncached, while this one has no usable value.
    pub fn fallback(mut self, unit: impl Into<String>) -> Self {
        self.fallback = Some(unit.into());
        self
    }

    /// Offset after which a computed record expires.
    pub fn expires_in(mut self, duration: Duration) -> Self {
        self.expires_in = Some(duration);
        self
    }

    /// Offset after which a computed record turns stale.
    pub fn stale_in(mut self, duration: Duration) -> Self {
        self.stale_in = Some(duration);
        self
    }

    /// Default for `force` when accessed through [`UnitHandle::access`].
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Validate ==
    /// Checks the declaration and converts it into a registered unit.
    pub(crate) fn build(self) -> Result<Unit> {
        if self.name.trim().is_empty() {
            return Err(CacheError::Configuration(
                "Unit name cannot be empty".to_string(),
            ));
        }

        if self.fallback.as_deref() == Some(self.name.as_str()) {
            return Err(CacheError::Configuration(format!(
                "Unit '{}' cannot be its own fallback",
                self.name
            )));
        }

        if let (Some(stale_in), Some(expires_in)) = (self.stale_in, self.expires_in) {
            if stale_in > expires_in {
                warn!(
                    unit = %self.name,
                    ?stale_in,
                    ?expires_in,
                    "stale_in exceeds expires_in, records will expire without going stale"
                );
            }
        }

        Ok(Unit {
            stale_in: to_offset(&self.name, self.stale_in)?,
            expires_in: to_offset(&self.name, self.expires_in)?,
            name: self.name,
            computation: self.computation,
            fallback: self.fallback,
            force: self.force,
        })
    }
}

impl fmt::Debug for UnitSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitSpec")
            .field("name", &self.name)
            .field("fallback", &self.fallback)
            .field("expires_in", &self.expires_in)
            .field("stale_in", &self.stale_in)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}

fn to_offset(unit: &str, duration: Option<Duration>) -> Result<Option<chrono::Duration>> {
    duration
        .map(|duration| {
            chrono::Duration::from_std(duration).map_err(|_| {
                CacheError::Configuration(format!(
                    "Unit '{}' has an out of range duration {:?}",
                    unit, duration
                ))
            })
        })
        .transpose()
}

// == Unit ==
/// A validated, registered computation.
pub(crate) struct Unit {
    pub name: String,
    pub computation: Computation,
    pub fallback: Option<String>,
    pub expires_in: Option<chrono::Duration>,
    pub stale_in: Option<chrono::Duration>,
    pub force: bool,
}

impl Unit {
    /// Runs the computation, tagging failures with the unit name.
    pub async fn compute(&self) -> Result<Value> {
        (self.computation)()
            .await
            .map_err(|source| CacheError::computation(&self.name, source))
    }
}

// == Unit Handle ==
/// Caller-facing handle returned by registration.
#[derive(Clone)]
pub struct UnitHandle {
    cache: QueuedCache,
    name: String,
}

impl UnitHandle {
    pub(crate) fn new(cache: QueuedCache, name: String) -> Self {
        Self { cache, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit's results using its configured `force` default.
    pub async fn access(&self) -> Result<Value> {
        self.cache.access(&self.name, None).await
    }

    /// Returns the unit's results, overriding the `force` default.
    pub async fn access_with(&self, force: bool) -> Result<Value> {
        self.cache.access(&self.name, Some(force)).await
    }

    /// Returns the unit's results decoded as `T`.
    pub async fn access_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_value(self.access().await?)?)
    }

    /// Deletes the stored record so the next access recomputes.
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.invalidate(&self.name).await
    }
}

impl fmt::Debug for UnitHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
