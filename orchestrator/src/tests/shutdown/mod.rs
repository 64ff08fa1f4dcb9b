use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use rstest::*;
use serde_json::Value;

use crate::core::client::queue::{QueueClient, QueueError};
use crate::core::shutdown::ShutdownCoordinator;
use crate::server::setup_server;
use crate::tests::common::{proof_input, test_queue_params, wait_for_state, FakeProver};
use crate::tests::config::TestConfigBuilder;
use crate::types::jobs::types::JobState;
use crate::types::params::QueueParams;
use crate::worker::WorkerController;

#[rstest]
#[tokio::test]
async fn shutdown_waits_for_in_flight_execution(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_millis(300)));
    let services = TestConfigBuilder::new()
        .configure_prover_client(prover.clone())
        .configure_shutdown_grace(Duration::from_secs(5))
        .build();
    let queue = services.memory_queue().clone();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    let id = queue.enqueue(proof_input).await.unwrap();
    wait_for_state(queue.as_ref(), id, JobState::Active).await;

    let (_, server) = setup_server(services.config.clone(), None).await.unwrap();
    let report = ShutdownCoordinator::new(services.config.clone()).with_server(server).with_workers(workers).shutdown().await;

    assert!(report.workers_drained);
    assert!(queue.is_closed());
    // The execution reached its terminal state before the queue was closed
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(prover.calls(), 1);
    assert!(services.scratch_files().is_empty());
}

#[rstest]
#[tokio::test]
async fn no_new_leases_after_shutdown_starts(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_millis(200)));
    let services = TestConfigBuilder::new().configure_prover_client(prover.clone()).build();
    let queue = services.memory_queue().clone();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    let first = queue.enqueue(proof_input.clone()).await.unwrap();
    wait_for_state(queue.as_ref(), first, JobState::Active).await;
    let second = queue.enqueue(proof_input).await.unwrap();

    ShutdownCoordinator::new(services.config.clone()).with_workers(workers).shutdown().await;

    assert_eq!(queue.get_status(first).await.unwrap().state, JobState::Completed);
    assert_eq!(queue.get_status(second).await.unwrap().state, JobState::Queued);
    assert_eq!(prover.calls(), 1);
}

#[rstest]
#[tokio::test]
async fn idle_slot_stops_waiting_for_a_lease(proof_input: Value) {
    let params = QueueParams { lease_wait: Duration::from_secs(3), ..test_queue_params() };
    let prover = Arc::new(FakeProver::succeeding());
    let services = TestConfigBuilder::new().configure_queue_params(params).configure_prover_client(prover.clone()).build();
    let queue = services.memory_queue().clone();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    // Let the slot park inside a long acquire wait
    tokio::time::sleep(Duration::from_millis(100)).await;

    workers.stop_acquiring();
    let id = queue.enqueue(proof_input).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts_made, 0);
    assert!(workers.drain(Duration::from_secs(1)).await);
    assert_eq!(prover.calls(), 0);
}

#[rstest]
#[tokio::test]
async fn stuck_execution_does_not_hang_shutdown(proof_input: Value) {
    let prover = Arc::new(FakeProver::succeeding().with_delay(Duration::from_secs(60)));
    let services = TestConfigBuilder::new()
        .configure_prover_client(prover)
        .configure_shutdown_grace(Duration::from_millis(200))
        .build();
    let queue = services.memory_queue().clone();

    let mut workers = WorkerController::new(services.config.clone());
    workers.start();
    let id = queue.enqueue(proof_input.clone()).await.unwrap();
    wait_for_state(queue.as_ref(), id, JobState::Active).await;

    let started = Instant::now();
    let report = ShutdownCoordinator::new(services.config.clone()).with_workers(workers).shutdown().await;

    assert!(!report.workers_drained);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(queue.is_closed());
    assert_matches!(queue.enqueue(proof_input).await, Err(QueueError::Unavailable(_)));

    // The abandoned job keeps its lease until it expires, and its artifacts are gone
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Active);
    assert!(services.scratch_files().is_empty());
}
