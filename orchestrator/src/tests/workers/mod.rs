use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use proof_prover_client_interface::{MockProverClient, ProverClientError};
use rstest::*;
use serde_json::{json, Value};

use crate::core::client::queue::QueueClient;
use crate::tests::common::{
    expected_proof, expected_public_signals, proof_input, wait_for_state, FakeProver, ProverBehaviour,
};
use crate::tests::config::{TestConfigBuilder, TestServices};
use crate::types::jobs::types::{JobState, TransitionOutcome};
use crate::worker::sweeper::sweep_once;
use crate::worker::{JobExecutor, WorkerController};

fn executor_for(services: &TestServices) -> JobExecutor {
    let config = &services.config;
    JobExecutor::new(
        config.queue(),
        config.prover(),
        config.prover_params().scratch_dir.clone(),
        config.queue_params().heartbeat_interval,
    )
}

#[rstest]
#[tokio::test]
async fn enqueued_job_is_proved_by_the_worker_pool(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding());
    let services = TestConfigBuilder::new().configure_prover_client(prover.clone()).build();
    let queue = services.config.queue();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    let id = queue.enqueue(proof_input.clone()).await.unwrap();

    let job = wait_for_state(queue.as_ref(), id, JobState::Completed).await;
    assert_eq!(job.result, Some(json!({ "proof": expected_proof(), "publicSignals": expected_public_signals() })));
    assert!(job.error.is_none());
    assert_eq!(job.attempts_made, 1);
    assert_eq!(prover.calls(), 1);

    assert!(workers.drain(Duration::from_secs(2)).await);
    assert!(services.scratch_files().is_empty(), "artifacts left behind: {:?}", services.scratch_files());
}

#[rstest]
#[tokio::test]
async fn witness_holds_the_job_input(proof_input: Value) {
    let services = TestConfigBuilder::new().build();
    let queue = services.memory_queue().clone();
    let id = queue.enqueue(proof_input.clone()).await.unwrap();
    let job = queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();

    let arena = crate::worker::arena::ArtifactArena::new(services.scratch.path(), id);
    arena.write_witness(&job.input).await.unwrap();
    let written: Value = serde_json::from_slice(&std::fs::read(arena.witness_path()).unwrap()).unwrap();
    assert_eq!(written, proof_input);

    assert_eq!(arena.release().await, 0);
    assert!(services.scratch_files().is_empty());
}

#[rstest]
#[case::non_zero_exit(ProverBehaviour::Fail, "Prover exited with status")]
#[case::malformed_output(ProverBehaviour::MalformedOutput, "Malformed prover output")]
#[case::panic(ProverBehaviour::Panic, "panicked")]
#[tokio::test]
async fn failed_executions_are_retried_then_failed(
    proof_input: Value,
    #[case] behaviour: ProverBehaviour,
    #[case] expected_error: &str,
) {
    let prover = Arc::new(FakeProver::new(behaviour));
    let services = TestConfigBuilder::new().configure_prover_client(prover.clone()).build();
    let queue = services.memory_queue().clone();
    let executor = executor_for(&services);
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(executor.execute(job, "w1").await.unwrap(), Some(TransitionOutcome::Applied(JobState::Queued)));
    assert!(services.scratch_files().is_empty());
    assert!(queue.get_status(id).await.unwrap().error.is_none());

    let job = queue.acquire_lease("w2", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(job.attempts_made, 2);
    assert_eq!(executor.execute(job, "w2").await.unwrap(), Some(TransitionOutcome::Applied(JobState::Failed)));
    assert!(services.scratch_files().is_empty());

    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert!(job.error.as_deref().unwrap().contains(expected_error), "unexpected error {:?}", job.error);
    assert!(job.result.is_none());
    assert_eq!(prover.calls(), 2);
}

#[rstest]
#[tokio::test]
async fn always_failing_prover_is_invoked_exactly_max_attempts_times(proof_input: Value) {
    let mut prover = MockProverClient::new();
    prover.expect_generate_proof().times(2).returning(|_| {
        Err(ProverClientError::NonZeroExit { code: Some(2), stderr: "witness mismatch".to_string() })
    });
    let services = TestConfigBuilder::new().configure_prover_client(Arc::new(prover)).build();
    let queue = services.config.queue();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = wait_for_state(queue.as_ref(), id, JobState::Failed).await;
    assert_eq!(job.attempts_made, 2);
    assert!(!job.error.unwrap_or_default().is_empty());

    // Give the slot a few more polls to prove no third lease happens
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(workers.drain(Duration::from_secs(2)).await);
    assert_eq!(queue.get_status(id).await.unwrap().attempts_made, 2);
}

#[tokio::test]
async fn missing_input_fails_without_running_the_prover() {
    let mut prover = MockProverClient::new();
    prover.expect_generate_proof().times(0);
    let services = TestConfigBuilder::new().configure_prover_client(Arc::new(prover)).build();
    let queue = services.memory_queue().clone();
    let id = queue.enqueue(Value::Null).await.unwrap();

    let job = queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();
    let transition = executor_for(&services).execute(job, "w1").await.unwrap();

    assert_eq!(transition, Some(TransitionOutcome::Applied(JobState::Failed)));
    assert_eq!(queue.get_status(id).await.unwrap().error.as_deref(), Some("Job input is missing"));
}

#[rstest]
#[tokio::test]
async fn cleanup_failure_does_not_change_the_outcome(proof_input: Value) {
    let prover = Arc::new(FakeProver::new(ProverBehaviour::SucceedAndBlockCleanup));
    let services = TestConfigBuilder::new().configure_prover_client(prover.clone()).build();
    let queue = services.memory_queue().clone();
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();
    let transition = executor_for(&services).execute(job, "w1").await.unwrap();

    assert_eq!(transition, Some(TransitionOutcome::Applied(JobState::Completed)));
    assert_eq!(queue.get_status(id).await.unwrap().state, JobState::Completed);
    // Only the blocked witness survives
    let task = prover.tasks().pop().unwrap();
    assert_eq!(services.scratch_files(), vec![task.witness_path]);
}

#[rstest]
#[tokio::test]
async fn reclaimed_job_result_is_dropped(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_millis(200)));
    let services = TestConfigBuilder::new().configure_prover_client(prover).build();
    let queue = services.memory_queue().clone();
    let executor = executor_for(&services);
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = queue.acquire_lease("W1", Duration::ZERO).await.unwrap().unwrap();
    let running = tokio::spawn(async move { executor.execute(job, "W1").await });

    // W1 looks dead to the sweeper, W2 takes over
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.expire_lease(id).unwrap();
    sweep_once(&services.config).await;
    let taken = queue.acquire_lease("W2", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(taken.id, id);

    assert_matches!(running.await.unwrap(), Ok(None));
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Active);
    assert_eq!(job.lease_owner.as_deref(), Some("W2"));
    assert!(job.result.is_none());
}

#[rstest]
#[tokio::test]
async fn rejected_heartbeat_stops_further_updates(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_millis(300)));
    let services = TestConfigBuilder::new().configure_prover_client(prover).build();
    let queue = services.memory_queue().clone();
    let executor = executor_for(&services);
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = queue.acquire_lease("W1", Duration::ZERO).await.unwrap().unwrap();
    let running = tokio::spawn(async move { executor.execute(job, "W1").await });

    // The next heartbeat (every 100ms) sees the expired lease before the sweeper runs
    tokio::time::sleep(Duration::from_millis(50)).await;
    queue.expire_lease(id).unwrap();

    assert_matches!(running.await.unwrap(), Ok(None));
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Active);
    assert!(job.result.is_none());

    sweep_once(&services.config).await;
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts_made, 1);
    assert!(services.scratch_files().is_empty());
}

#[rstest]
#[tokio::test]
async fn heartbeats_keep_a_long_execution_alive(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_millis(400)));
    let params = crate::types::params::QueueParams {
        lease_duration: Duration::from_millis(150),
        heartbeat_interval: Duration::from_millis(40),
        ..crate::tests::common::test_queue_params()
    };
    let services = TestConfigBuilder::new().configure_queue_params(params).configure_prover_client(prover).build();
    let queue = services.memory_queue().clone();
    let id = queue.enqueue(proof_input).await.unwrap();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();

    // The sweeper runs every 50ms, far more often than the prover takes
    let job = wait_for_state(queue.as_ref(), id, JobState::Completed).await;
    assert_eq!(job.attempts_made, 1);
    assert!(workers.drain(Duration::from_secs(2)).await);
}
