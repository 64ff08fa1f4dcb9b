use proof_prover_client_interface::ProverClientError;
use thiserror::Error;

use crate::types::jobs::types::FailureKind;

pub type JobResult<T> = Result<T, JobError>;

/// Ways a single proof execution can fail on the worker side
#[derive(Error, Debug)]
pub enum JobError {
    /// The job carries no input to prove
    #[error("Job input is missing")]
    MissingInput,

    #[error("Job input could not be serialized: {0}")]
    InvalidInput(String),

    #[error("Prover failed: {0}")]
    Computation(#[from] ProverClientError),

    #[error("Malformed prover output in {artifact}: {reason}")]
    MalformedOutput { artifact: String, reason: String },

    #[error("Artifact {path} could not be accessed: {source}")]
    Artifact {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Proof execution panicked: {0}")]
    Panicked(String),
}

impl JobError {
    /// Maps the failure onto the retry policy. Only inputs that can never succeed skip the retry budget.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            JobError::MissingInput | JobError::InvalidInput(_) => FailureKind::Terminal,
            JobError::Computation(_)
            | JobError::MalformedOutput { .. }
            | JobError::Artifact { .. }
            | JobError::Panicked(_) => FailureKind::Retryable,
        }
    }
}
