use thiserror::Error;
use uuid::Uuid;

use crate::types::jobs::types::JobState;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The broker cannot be reached right now. Callers may retry.
    #[error("Queue broker unavailable: {0}")]
    Unavailable(String),

    #[error("Job {0} not found")]
    NotFound(Uuid),

    #[error("Job {id} cannot be leased in state {state}")]
    NotAvailable { id: Uuid, state: JobState },

    #[error("Worker {worker_id} no longer holds the lease on job {id}")]
    LeaseLost { id: Uuid, worker_id: String },

    #[error("Failed to serialize job payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Broker error: {0}")]
    Broker(redis::RedisError),

    #[error("Corrupt job record {id}: {reason}")]
    CorruptRecord { id: String, reason: String },

    #[error("Queue state lock poisoned: {0}")]
    LockPoisoned(String),
}

impl From<redis::RedisError> for QueueError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_connection_refusal() || err.is_connection_dropped() || err.is_timeout() {
            QueueError::Unavailable(err.to_string())
        } else {
            QueueError::Broker(err)
        }
    }
}

impl QueueError {
    /// Whether the failure is a transient broker outage rather than a state conflict
    pub fn is_unavailable(&self) -> bool {
        matches!(self, QueueError::Unavailable(_))
    }
}
