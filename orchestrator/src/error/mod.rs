pub mod job;

use thiserror::Error;

use crate::core::client::broker::BrokerError;
use crate::core::client::queue::QueueError;
pub use job::{JobError, JobResult};

/// Result type for orchestrator operations
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Error types for the orchestrator
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("Broker error: {0}")]
    BrokerError(#[from] BrokerError),

    #[error("Job error: {0}")]
    JobError(#[from] JobError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Setup error
    #[error("Setup error: {0}")]
    SetupError(String),

    /// Server error
    #[error("Server error: {0}")]
    ServerError(String),

    /// Worker error
    #[error("Worker error: {0}")]
    WorkerError(String),

    #[error("Orchestrator Error: {0}")]
    OrchestratorAnyHowError(#[from] anyhow::Error),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
