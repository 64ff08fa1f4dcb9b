use std::path::PathBuf;

use async_trait::async_trait;
use mockall::automock;

/// Prover client provides an abstraction over the external proof computation:
/// - Read a witness artifact produced from the caller-supplied input
/// - Run the proving routine against the configured proving key
/// - Write the proof and the public signals to the designated output artifacts
///
/// Implementations block the calling task for the full duration of the computation, which may
/// range from seconds to minutes. They never delete any of the artifacts they are handed.
#[automock]
#[async_trait]
pub trait ProverClient: Send + Sync {
    async fn generate_proof(&self, task: &ProofTask) -> Result<(), ProverClientError>;
}

/// Artifact paths for a single proof computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofTask {
    /// Identifier used for logging only (the job id)
    pub task_id: String,
    pub witness_path: PathBuf,
    pub proof_path: PathBuf,
    pub public_signals_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ProverClientError {
    #[error("Failed to launch prover {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Prover exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("Prover was terminated by a signal: {stderr}")]
    Terminated { stderr: String },
    #[error("Prover did not produce artifact {0}")]
    MissingArtifact(String),
    #[error("Internal prover error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
