//! Job Queue Module
//!
//! Contract for the job system that runs background refreshes, plus a
//! bounded in-process channel implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::cache::Namespace;
use crate::error::{CacheError, Result};

// == Refresh Job ==
/// Request to recompute one unit in the background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshJob {
    pub namespace: Namespace,
    pub unit: String,
    pub enqueued_at: DateTime<Utc>,
}

// == Job Queue Trait ==
/// Schedules later execution of [`crate::cache::QueuedCache::run`].
///
/// Delivery may be at-least-once: a duplicate run re-checks staleness and
/// does nothing if the record is already fresh.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, job: RefreshJob) -> Result<()>;
}

// == Channel Queue ==
/// Bounded tokio channel feeding a refresh worker.
#[derive(Debug, Clone)]
pub struct ChannelQueue {
    sender: mpsc::Sender<RefreshJob>,
}

impl ChannelQueue {
    /// Creates a queue holding at most `capacity` pending jobs, returning the
    /// receiving half for the worker.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<RefreshJob>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl JobQueue for ChannelQueue {
    async fn enqueue(&self, job: RefreshJob) -> Result<()> {
        // Never block the caller on a full queue
        self.sender.try_send(job).map_err(|err| match err {
            TrySendError::Full(job) => {
                CacheError::Queue(format!("Refresh queue is full, dropped '{}'", job.unit))
            }
            TrySendError::Closed(job) => {
                CacheError::Queue(format!("Refresh queue is closed, dropped '{}'", job.unit))
            }
        })
    }
}
