use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use proof_prover_client_interface::{ProofTask, ProverClient, ProverClientError};
use rstest::fixture;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::client::queue::QueueClient;
use crate::types::jobs::job_item::JobItem;
use crate::types::jobs::types::JobState;
use crate::types::params::QueueParams;

/// Short timings so lease, poll and stall paths run in milliseconds
pub fn test_queue_params() -> QueueParams {
    QueueParams {
        name: "test-proof-generation".to_string(),
        lease_duration: Duration::from_secs(2),
        heartbeat_interval: Duration::from_millis(100),
        stall_check_interval: Duration::from_millis(50),
        max_attempts: 2,
        lease_wait: Duration::from_millis(50),
        poll_interval: Duration::from_millis(10),
        retention: None,
    }
}

#[fixture]
pub fn proof_input() -> Value {
    json!({ "signature": "0x5f3c", "modulus": "0xc1a7", "message": "hello" })
}

pub fn expected_proof() -> Value {
    json!({ "pi_a": ["1", "2", "1"], "pi_b": [["3", "4"], ["5", "6"]], "pi_c": ["7", "8", "1"], "protocol": "groth16" })
}

pub fn expected_public_signals() -> Value {
    json!(["1", "65537"])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProverBehaviour {
    /// Writes both output artifacts
    Succeed,
    /// Exits with a non-zero status
    Fail,
    /// Writes a proof artifact that is not JSON
    MalformedOutput,
    Panic,
    /// Succeeds, but leaves a directory where the witness was, so its deletion fails
    SucceedAndBlockCleanup,
}

/// Prover stand-in with a configurable outcome and run time.
pub struct FakeProver {
    behaviour: ProverBehaviour,
    delay: Duration,
    calls: AtomicUsize,
    tasks: Mutex<Vec<ProofTask>>,
}

impl FakeProver {
    pub fn new(behaviour: ProverBehaviour) -> Self {
        Self { behaviour, delay: Duration::ZERO, calls: AtomicUsize::new(0), tasks: Mutex::new(Vec::new()) }
    }

    pub fn succeeding() -> Self {
        Self::new(ProverBehaviour::Succeed)
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn tasks(&self) -> Vec<ProofTask> {
        self.tasks.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProverClient for FakeProver {
    async fn generate_proof(&self, task: &ProofTask) -> Result<(), ProverClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.tasks.lock().unwrap().push(task.clone());
        assert!(task.witness_path.exists(), "witness must be written before the prover runs");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behaviour {
            ProverBehaviour::Succeed | ProverBehaviour::SucceedAndBlockCleanup => {
                write_json(&task.proof_path, &expected_proof()).await;
                write_json(&task.public_signals_path, &expected_public_signals()).await;
                if self.behaviour == ProverBehaviour::SucceedAndBlockCleanup {
                    tokio::fs::remove_file(&task.witness_path).await.unwrap();
                    tokio::fs::create_dir(&task.witness_path).await.unwrap();
                    tokio::fs::write(task.witness_path.join("keep"), b"x").await.unwrap();
                }
                Ok(())
            }
            ProverBehaviour::Fail => {
                Err(ProverClientError::NonZeroExit { code: Some(1), stderr: "constraint doesn't match".to_string() })
            }
            ProverBehaviour::MalformedOutput => {
                tokio::fs::write(&task.proof_path, b"not json").await.unwrap();
                write_json(&task.public_signals_path, &expected_public_signals()).await;
                Ok(())
            }
            ProverBehaviour::Panic => panic!("prover crashed"),
        }
    }
}

async fn write_json(path: &std::path::Path, value: &Value) {
    tokio::fs::write(path, serde_json::to_vec(value).unwrap()).await.unwrap();
}

/// Polls the queue until the job satisfies `predicate` or `timeout` elapses.
pub async fn wait_for_job(
    queue: &dyn QueueClient,
    job_id: Uuid,
    timeout: Duration,
    predicate: impl Fn(&JobItem) -> bool,
) -> JobItem {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let job = queue.get_status(job_id).await.expect("job should exist");
        if predicate(&job) {
            return job;
        }
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for job {job_id}, last state {}", job.state);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

pub async fn wait_for_state(queue: &dyn QueueClient, job_id: Uuid, state: JobState) -> JobItem {
    wait_for_job(queue, job_id, Duration::from_secs(5), |job| job.state == state).await
}
