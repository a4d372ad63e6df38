//! Refresh Worker Task
//!
//! Background task draining the in-process refresh queue.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::{QueuedCache, RefreshJob};

/// Spawns a worker that runs every job received from a
/// [`crate::cache::ChannelQueue`] against `cache`.
///
/// Each job gets its own task so one slow computation does not hold up
/// refreshes of other units. Failed jobs are logged and not retried. The
/// worker exits once every sender has been dropped.
///
/// # Arguments
/// * `cache` - Cache whose units the jobs refer to
/// * `receiver` - Receiving half returned by `ChannelQueue::new`
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the worker
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let (queue, receiver) = ChannelQueue::new(1024);
/// let cache = QueuedCache::builder(namespace)
///     .store(Arc::new(MemoryStore::new()))
///     .queue(Arc::new(queue))
///     .build()?;
/// let worker = spawn_refresh_worker(cache.clone(), receiver);
/// // Later, during shutdown:
/// worker.abort();
/// ```
pub fn spawn_refresh_worker(
    cache: QueuedCache,
    mut receiver: mpsc::Receiver<RefreshJob>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(owner = %cache.namespace().owner, "Starting refresh worker");

        while let Some(job) = receiver.recv().await {
            if &job.namespace != cache.namespace() {
                warn!(
                    unit = %job.unit,
                    owner = %job.namespace.owner,
                    version = %job.namespace.version,
                    "Dropping refresh job for another namespace"
                );
                continue;
            }

            let cache = cache.clone();
            tokio::spawn(async move {
                debug!(unit = %job.unit, enqueued_at = %job.enqueued_at, "Running refresh job");
                if let Err(err) = cache.run(&job.unit).await {
                    warn!(unit = %job.unit, error = %err, "Refresh job failed");
                }
            });
        }

        info!("Refresh queue closed, worker stopping");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ChannelQueue, MemoryStore, Namespace, RefreshOutcome, UnitSpec};
    use crate::error::BoxError;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn build(capacity: usize) -> (QueuedCache, mpsc::Receiver<RefreshJob>) {
        let (queue, receiver) = ChannelQueue::new(capacity);
        let cache = QueuedCache::builder(Namespace::new("worker-test", "v1"))
            .store(Arc::new(MemoryStore::new()))
            .queue(Arc::new(queue))
            .build()
            .unwrap();
        (cache, receiver)
    }

    #[tokio::test]
    async fn test_worker_runs_queued_refresh() {
        let (cache, receiver) = build(8);
        let calls = Arc::new(AtomicU64::new(0));
        let counter = calls.clone();
        cache
            .register(UnitSpec::new("report", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, BoxError>(json!("done")) }
            }))
            .unwrap();

        let handle = spawn_refresh_worker(cache.clone(), receiver);
        assert!(cache.queue_refresh("report").await.unwrap());

        // Wait for the job to land
        for _ in 0..50 {
            if cache.record("report").await.unwrap().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().refreshes_completed, 1);
        assert_eq!(
            cache.run("report").await.unwrap(),
            RefreshOutcome::AlreadyFresh
        );

        handle.abort();
    }

    #[tokio::test]
    async fn test_worker_ignores_foreign_namespace() {
        let (cache, _receiver) = build(8);

        let (sender, foreign_receiver) = mpsc::channel(1);
        let handle = spawn_refresh_worker(cache.clone(), foreign_receiver);
        sender
            .send(RefreshJob {
                namespace: Namespace::new("someone-else", "v1"),
                unit: "report".to_string(),
                enqueued_at: chrono::Utc::now(),
            })
            .await
            .unwrap();
        drop(sender);

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker should stop once the queue closes")
            .unwrap();
        assert_eq!(cache.stats().refreshes_skipped, 0);
    }

    #[tokio::test]
    async fn test_worker_can_be_aborted() {
        let (cache, receiver) = build(8);

        let handle = spawn_refresh_worker(cache, receiver);

        // Abort immediately
        handle.abort();

        // Wait a bit and verify task is finished
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_finished(), "Task should be finished after abort");
    }
}
