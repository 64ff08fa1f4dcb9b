use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use proof_prover_client_interface::{ProofTask, ProverClient, ProverClientError};
use tokio::process::Command;
use tracing::{debug, warn};

/// Upper bound on the amount of prover stderr kept in an error message
const MAX_STDERR_BYTES: usize = 4096;

/// Runs a native prover binary as a child process.
///
/// The binary is invoked with fixed positional arguments:
/// `<proving_key> <witness> <proof_out> <public_signals_out>`.
/// A zero exit status with both output artifacts present is a success, anything else is a failure.
/// Dropping the returned future kills the child, so an abandoned execution never writes artifacts later.
#[derive(Debug, Clone)]
pub struct NativeProver {
    binary: PathBuf,
    proving_key: PathBuf,
}

impl NativeProver {
    pub fn new(binary: impl Into<PathBuf>, proving_key: impl Into<PathBuf>) -> Self {
        let prover = Self { binary: binary.into(), proving_key: proving_key.into() };
        if !prover.binary.exists() {
            warn!(binary = %prover.binary.display(), "Prover binary not found, proof jobs will fail until it exists");
        }
        if !prover.proving_key.exists() {
            warn!(proving_key = %prover.proving_key.display(), "Proving key not found");
        }
        prover
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    pub fn proving_key(&self) -> &Path {
        &self.proving_key
    }
}

#[async_trait]
impl ProverClient for NativeProver {
    async fn generate_proof(&self, task: &ProofTask) -> Result<(), ProverClientError> {
        debug!(task_id = %task.task_id, binary = %self.binary.display(), "Launching prover");

        let output = Command::new(&self.binary)
            .arg(&self.proving_key)
            .arg(&task.witness_path)
            .arg(&task.proof_path)
            .arg(&task.public_signals_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| ProverClientError::Spawn { binary: self.binary.display().to_string(), source })?;

        let stderr = tail_utf8(&output.stderr, MAX_STDERR_BYTES);

        if !output.status.success() {
            return match output.status.code() {
                Some(code) => Err(ProverClientError::NonZeroExit { code: Some(code), stderr }),
                None => Err(ProverClientError::Terminated { stderr }),
            };
        }

        for artifact in [&task.proof_path, &task.public_signals_path] {
            if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
                return Err(ProverClientError::MissingArtifact(artifact.display().to_string()));
            }
        }

        debug!(task_id = %task.task_id, "Prover exited successfully");
        Ok(())
    }
}

/// Keeps the last `max` bytes of `bytes`, lossily decoded.
fn tail_utf8(bytes: &[u8], max: usize) -> String {
    let start = bytes.len().saturating_sub(max);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}
