use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use proof_prover_client_interface::ProverClient;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::arena::ArtifactArena;
use super::heartbeat::LeaseKeeper;
use super::outcome::ExecutionOutcome;
use crate::core::client::queue::{QueueClient, QueueError};
use crate::error::{JobError, JobResult};
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::types::{JobState, TransitionOutcome};
use crate::utils::metrics::ORCHESTRATOR_METRICS;

/// Turns one leased job into a terminal (or re-queued) state.
#[derive(Clone)]
pub struct JobExecutor {
    queue: Arc<dyn QueueClient>,
    prover: Arc<dyn ProverClient>,
    scratch_dir: PathBuf,
    heartbeat_interval: Duration,
}

impl JobExecutor {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        prover: Arc<dyn ProverClient>,
        scratch_dir: PathBuf,
        heartbeat_interval: Duration,
    ) -> Self {
        Self { queue, prover, scratch_dir, heartbeat_interval }
    }

    /// Runs the prover for `job` and records the outcome against the queue.
    ///
    /// Returns `Ok(None)` when the lease was lost, either because a heartbeat was rejected during
    /// execution or because the queue answered `LeaseLost`. No update is sent to the queue after a
    /// rejected heartbeat, the stall sweep owns the job from then on.
    pub async fn execute(&self, job: JobItem, worker_id: &str) -> Result<Option<TransitionOutcome>, QueueError> {
        let job_id = job.id;
        info!(job_id = %job_id, attempts_made = job.attempts_made, "Executing proof job");

        let arena = ArtifactArena::new(&self.scratch_dir, job_id);
        let keeper = LeaseKeeper::spawn(self.queue.clone(), job_id, worker_id.to_string(), self.heartbeat_interval);

        let started = Instant::now();
        let result = AssertUnwindSafe(self.run(&job, &arena)).catch_unwind().await.unwrap_or_else(|panic| {
            let message = panic_message(panic.as_ref());
            error!(job_id = %job_id, panic = %message, "Proof execution panicked");
            Err(JobError::Panicked(message))
        });
        let elapsed = started.elapsed();
        ORCHESTRATOR_METRICS.proof_duration.record(elapsed.as_secs_f64(), &[]);

        let lease_lost = keeper.stop().await;
        arena.release().await;

        let outcome = ExecutionOutcome::classify(result);
        if lease_lost {
            // The keeper already counted the lost lease
            warn!(job_id = %job_id, success = outcome.is_success(), "Lease was lost during execution, dropping result");
            return Ok(None);
        }

        let reported = match &outcome {
            ExecutionOutcome::Complete(result) => self.queue.complete(job_id, worker_id, result.clone()).await,
            ExecutionOutcome::Fail { kind, error } => {
                warn!(job_id = %job_id, kind = ?kind, error = %error, "Proof execution failed");
                self.queue.fail(job_id, worker_id, error, *kind).await
            }
        };

        match reported {
            Ok(transition) => {
                record_transition(job_id, &transition, elapsed);
                Ok(Some(transition))
            }
            Err(e @ QueueError::LeaseLost { .. }) => {
                ORCHESTRATOR_METRICS.leases_lost.add(1, &[]);
                warn!(job_id = %job_id, error = %e, "Job was reclaimed by another worker, dropping result");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&self, job: &JobItem, arena: &ArtifactArena) -> JobResult<Value> {
        if job.input.is_null() {
            return Err(JobError::MissingInput);
        }
        arena.write_witness(&job.input).await?;
        self.prover.generate_proof(&arena.task()).await?;

        let proof = arena.read_output(arena.proof_path()).await?;
        let public_signals = arena.read_output(arena.public_signals_path()).await?;
        Ok(json!({ "proof": proof, "publicSignals": public_signals }))
    }
}

fn record_transition(job_id: uuid::Uuid, transition: &TransitionOutcome, elapsed: Duration) {
    match transition {
        TransitionOutcome::Applied(JobState::Completed) => {
            ORCHESTRATOR_METRICS.jobs_completed.add(1, &[]);
            info!(job_id = %job_id, duration_ms = elapsed.as_millis() as u64, "Proof job completed");
        }
        TransitionOutcome::Applied(JobState::Failed) => {
            ORCHESTRATOR_METRICS.jobs_failed.add(1, &[]);
            error!(job_id = %job_id, "Proof job failed permanently");
        }
        TransitionOutcome::Applied(JobState::Queued) => {
            ORCHESTRATOR_METRICS.jobs_retried.add(1, &[]);
            info!(job_id = %job_id, "Proof job re-queued for another attempt");
        }
        TransitionOutcome::Applied(state) => debug!(job_id = %job_id, state = %state, "Job transitioned"),
        TransitionOutcome::AlreadyTerminal(state) => {
            debug!(job_id = %job_id, state = %state, "Job was already terminal, result ignored");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
