pub mod error;
pub mod memory;
pub mod redis;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use error::QueueError;
use serde_json::Value;
use uuid::Uuid;

use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::types::{FailureKind, StalledJob, TransitionOutcome};

/// Durable job store with lease-based dequeue.
///
/// A worker owns a job only while its lease is live. Every state change is atomic against the
/// backing store, so two workers never hold a live lease on the same job.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Persists a new `queued` job and returns its id.
    async fn enqueue(&self, input: Value) -> Result<Uuid, QueueError>;

    /// Leases the next queued job for `worker_id`, waiting up to `wait` on an empty queue.
    ///
    /// Returns `Ok(None)` when nothing became available in time.
    async fn acquire_lease(&self, worker_id: &str, wait: Duration) -> Result<Option<JobItem>, QueueError>;

    /// Extends the lease held by `worker_id` and returns the new deadline.
    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<DateTime<Utc>, QueueError>;

    async fn complete(&self, job_id: Uuid, worker_id: &str, result: Value) -> Result<TransitionOutcome, QueueError>;

    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: FailureKind,
    ) -> Result<TransitionOutcome, QueueError>;

    /// Moves every job whose lease has expired back to `queued`, or to `failed` once out of attempts.
    async fn recover_stalled(&self) -> Result<Vec<StalledJob>, QueueError>;

    /// Read-only snapshot of a job
    async fn get_status(&self, job_id: Uuid) -> Result<JobItem, QueueError>;

    /// Deletes terminal jobs that finished more than `older_than` ago. Returns how many were removed.
    async fn purge_finished(&self, older_than: Duration) -> Result<u64, QueueError>;

    /// Perform a health check on the queue backend
    async fn health_check(&self) -> Result<(), QueueError>;

    /// Stops admitting and leasing jobs. Status reads keep working.
    async fn close(&self) -> Result<(), QueueError>;
}
