use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use proof_prover_client_interface::ProofTask;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{JobError, JobResult};
use crate::types::constant::{
    PROOF_FILE_PREFIX, PUBLIC_SIGNALS_FILE_PREFIX, WITNESS_FILE_EXTENSION, WITNESS_FILE_PREFIX,
};
use crate::utils::metrics::ORCHESTRATOR_METRICS;

/// Temporary artifacts of a single job execution.
///
/// Every path is namespaced by the job id, so concurrent executions never collide. The arena
/// must be handed back through [`ArtifactArena::release`]. If it is dropped instead (a panic
/// unwinding through the execution, or the task being aborted) the files are removed
/// synchronously from `Drop`.
#[derive(Debug)]
pub struct ArtifactArena {
    job_id: Uuid,
    witness: PathBuf,
    proof: PathBuf,
    public_signals: PathBuf,
    released: bool,
}

impl ArtifactArena {
    pub fn new(scratch_dir: &Path, job_id: Uuid) -> Self {
        Self {
            job_id,
            witness: scratch_dir.join(format!("{WITNESS_FILE_PREFIX}{job_id}.{WITNESS_FILE_EXTENSION}")),
            proof: scratch_dir.join(format!("{PROOF_FILE_PREFIX}{job_id}.json")),
            public_signals: scratch_dir.join(format!("{PUBLIC_SIGNALS_FILE_PREFIX}{job_id}.json")),
            released: false,
        }
    }

    pub fn witness_path(&self) -> &Path {
        &self.witness
    }

    pub fn proof_path(&self) -> &Path {
        &self.proof
    }

    pub fn public_signals_path(&self) -> &Path {
        &self.public_signals
    }

    pub fn paths(&self) -> [&Path; 3] {
        [&self.witness, &self.proof, &self.public_signals]
    }

    /// Serializes the job input into the witness artifact.
    pub async fn write_witness(&self, input: &Value) -> JobResult<()> {
        if let Some(parent) = self.witness.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|source| artifact_error(parent, source))?;
        }
        let bytes = serde_json::to_vec(input).map_err(|e| JobError::InvalidInput(e.to_string()))?;
        tokio::fs::write(&self.witness, bytes).await.map_err(|source| artifact_error(&self.witness, source))?;
        debug!(job_id = %self.job_id, path = %self.witness.display(), "Witness written");
        Ok(())
    }

    /// Reads one prover output artifact back as JSON.
    pub async fn read_output(&self, path: &Path) -> JobResult<Value> {
        let bytes = tokio::fs::read(path).await.map_err(|source| artifact_error(path, source))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| JobError::MalformedOutput { artifact: path.display().to_string(), reason: e.to_string() })
    }

    pub fn task(&self) -> ProofTask {
        ProofTask {
            task_id: self.job_id.to_string(),
            witness_path: self.witness.clone(),
            proof_path: self.proof.clone(),
            public_signals_path: self.public_signals.clone(),
        }
    }

    /// Deletes every artifact. Failures are logged and counted, never returned.
    ///
    /// Returns the number of artifacts that could not be removed.
    pub async fn release(mut self) -> usize {
        self.released = true;
        let mut failures = 0;
        for path in self.paths() {
            match tokio::fs::remove_file(path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    failures += 1;
                    report_cleanup_failure(self.job_id, path, &e);
                }
            }
        }
        failures
    }
}

impl Drop for ArtifactArena {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for path in self.paths() {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => report_cleanup_failure(self.job_id, path, &e),
            }
        }
    }
}

fn report_cleanup_failure(job_id: Uuid, path: &Path, error: &std::io::Error) {
    ORCHESTRATOR_METRICS.artifact_cleanup_failures.add(1, &[]);
    warn!(job_id = %job_id, path = %path.display(), error = %error, "Failed to delete temporary artifact");
}

fn artifact_error(path: &Path, source: std::io::Error) -> JobError {
    JobError::Artifact { path: path.display().to_string(), source }
}
