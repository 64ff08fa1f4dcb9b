use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use futures::future::join_all;
use rstest::*;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::core::client::queue::memory::InMemoryJobQueue;
use crate::core::client::queue::{QueueClient, QueueError};
use crate::tests::common::{proof_input, test_queue_params};
use crate::types::constant::STALLED_JOB_ERROR;
use crate::types::jobs::types::{FailureKind, JobState, StalledJob, TransitionOutcome};

#[fixture]
fn queue() -> Arc<InMemoryJobQueue> {
    Arc::new(InMemoryJobQueue::new(test_queue_params()))
}

#[rstest]
#[tokio::test]
async fn enqueue_assigns_unique_ids_and_stores_input(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let mut ids = HashSet::new();
    for _ in 0..50 {
        assert!(ids.insert(queue.enqueue(proof_input.clone()).await.unwrap()));
    }

    let id = *ids.iter().next().unwrap();
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.input, proof_input);
    assert_eq!(job.attempts_made, 0);
    assert!(job.lease_owner.is_none());
}

#[rstest]
#[tokio::test]
async fn unknown_job_is_not_found(queue: Arc<InMemoryJobQueue>) {
    let id = Uuid::new_v4();
    assert_matches!(queue.get_status(id).await, Err(QueueError::NotFound(missing)) if missing == id);
}

#[rstest]
#[tokio::test]
async fn empty_queue_waits_then_returns_none(queue: Arc<InMemoryJobQueue>) {
    let started = Instant::now();
    assert!(queue.acquire_lease("w1", Duration::from_millis(60)).await.unwrap().is_none());
    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[rstest]
#[tokio::test]
async fn waiting_worker_picks_up_job_enqueued_later(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let waiter = {
        let queue = queue.clone();
        tokio::spawn(async move { queue.acquire_lease("w1", Duration::from_secs(2)).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;
    let id = queue.enqueue(proof_input).await.unwrap();

    let job = waiter.await.unwrap().unwrap().expect("job should be leased");
    assert_eq!(job.id, id);
}

#[rstest]
#[case(1, 16)]
#[case(8, 32)]
#[tokio::test]
async fn concurrent_acquires_never_share_a_job(
    queue: Arc<InMemoryJobQueue>,
    #[case] jobs: usize,
    #[case] workers: usize,
) {
    for i in 0..jobs {
        queue.enqueue(json!({ "n": i })).await.unwrap();
    }

    let attempts = (0..workers).map(|w| {
        let queue = queue.clone();
        tokio::spawn(async move { queue.acquire_lease(&format!("w{w}"), Duration::from_millis(50)).await })
    });
    let leased: Vec<_> = join_all(attempts).await.into_iter().filter_map(|r| r.unwrap().unwrap()).collect();

    assert_eq!(leased.len(), jobs);
    let distinct: HashSet<Uuid> = leased.iter().map(|job| job.id).collect();
    assert_eq!(distinct.len(), jobs);
    for job in &leased {
        assert_eq!(job.state, JobState::Active);
        assert_eq!(job.attempts_made, 1);
    }
}

#[rstest]
#[tokio::test]
async fn stalled_job_is_redelivered_to_another_worker(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let id = queue.enqueue(proof_input).await.unwrap();
    let leased = queue.acquire_lease("W1", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(leased.id, id);

    // W1 dies: no heartbeat, no completion
    queue.expire_lease(id).unwrap();
    let recovered = queue.recover_stalled().await.unwrap();
    assert_eq!(recovered, vec![StalledJob { id, attempts_made: 1, outcome: JobState::Queued }]);

    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Queued);
    assert_eq!(job.attempts_made, 1);
    assert_matches!(queue.heartbeat(id, "W1").await, Err(QueueError::LeaseLost { .. }));

    let redelivered = queue.acquire_lease("W2", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(redelivered.id, id);
    assert_eq!(redelivered.attempts_made, 2);
    let result = json!({ "proof": { "pi_a": [] }, "publicSignals": [] });
    assert_eq!(
        queue.complete(id, "W2", result.clone()).await.unwrap(),
        TransitionOutcome::Applied(JobState::Completed)
    );

    // The original worker waking up late changes nothing
    assert_eq!(
        queue.complete(id, "W1", json!({ "stale": true })).await.unwrap(),
        TransitionOutcome::AlreadyTerminal(JobState::Completed)
    );
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.result, Some(result));
    assert!(job.error.is_none());
}

#[rstest]
#[tokio::test]
async fn stall_bound_makes_job_terminal(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let id = queue.enqueue(proof_input).await.unwrap();
    for attempt in 1..=2u64 {
        let job = queue.acquire_lease("w", Duration::ZERO).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, attempt);
        queue.expire_lease(id).unwrap();
        queue.recover_stalled().await.unwrap();
    }

    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.state, JobState::Failed);
    assert_eq!(job.error.as_deref(), Some(STALLED_JOB_ERROR));
    assert!(job.result.is_none());
    assert!(queue.acquire_lease("w", Duration::ZERO).await.unwrap().is_none());
}

#[rstest]
#[tokio::test]
async fn live_leases_are_not_recovered(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    queue.enqueue(proof_input).await.unwrap();
    queue.acquire_lease("w", Duration::ZERO).await.unwrap().unwrap();
    assert!(queue.recover_stalled().await.unwrap().is_empty());
}

#[rstest]
#[tokio::test]
async fn heartbeat_extends_the_lease(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let id = queue.enqueue(proof_input).await.unwrap();
    let job = queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let extended = queue.heartbeat(id, "w1").await.unwrap();
    assert!(extended > job.lease_expires_at.unwrap());
    assert_matches!(queue.heartbeat(id, "w2").await, Err(QueueError::LeaseLost { .. }));
}

#[rstest]
#[tokio::test]
async fn terminal_failure_ignores_remaining_attempts(queue: Arc<InMemoryJobQueue>) {
    let id = queue.enqueue(Value::Null).await.unwrap();
    queue.acquire_lease("w1", Duration::ZERO).await.unwrap().unwrap();

    assert_eq!(
        queue.fail(id, "w1", "Job input is missing", FailureKind::Terminal).await.unwrap(),
        TransitionOutcome::Applied(JobState::Failed)
    );
    assert_eq!(
        queue.fail(id, "w1", "second report", FailureKind::Retryable).await.unwrap(),
        TransitionOutcome::AlreadyTerminal(JobState::Failed)
    );
    let job = queue.get_status(id).await.unwrap();
    assert_eq!(job.error.as_deref(), Some("Job input is missing"));
}

#[rstest]
#[tokio::test]
async fn purge_removes_only_old_terminal_jobs(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let done = queue.enqueue(proof_input.clone()).await.unwrap();
    let waiting = queue.enqueue(proof_input).await.unwrap();
    let leased = queue.acquire_lease("w", Duration::ZERO).await.unwrap().unwrap();
    assert_eq!(leased.id, done);
    queue.complete(done, "w", json!({})).await.unwrap();

    assert_eq!(queue.purge_finished(Duration::from_secs(3600)).await.unwrap(), 0);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert_eq!(queue.purge_finished(Duration::ZERO).await.unwrap(), 1);

    assert_matches!(queue.get_status(done).await, Err(QueueError::NotFound(_)));
    assert_eq!(queue.get_status(waiting).await.unwrap().state, JobState::Queued);
}

#[rstest]
#[tokio::test]
async fn closed_queue_rejects_work_but_serves_status(queue: Arc<InMemoryJobQueue>, proof_input: Value) {
    let id = queue.enqueue(proof_input.clone()).await.unwrap();
    queue.close().await.unwrap();

    assert!(queue.is_closed());
    assert_matches!(queue.enqueue(proof_input).await, Err(QueueError::Unavailable(_)));
    assert_matches!(queue.acquire_lease("w", Duration::ZERO).await, Err(QueueError::Unavailable(_)));
    assert_matches!(queue.health_check().await, Err(QueueError::Unavailable(_)));
    assert_eq!(queue.get_status(id).await.unwrap().state, JobState::Queued);
}

/// The same lease and stall rules against a live Redis.
mod redis_backend {
    use super::*;
    use crate::core::client::broker::BrokerClient;
    use crate::core::client::queue::redis::RedisJobQueue;
    use crate::types::params::{QueueParams, RedisParams};
    use tokio_util::sync::CancellationToken;

    async fn redis_queue(lease: Duration) -> (RedisJobQueue, BrokerClient) {
        let url = std::env::var("REDIS_URL").expect("REDIS_URL must point at a disposable Redis");
        let redis_params = RedisParams {
            url: Some(url),
            backoff_base: Duration::from_millis(50),
            backoff_cap: Duration::from_millis(500),
            health_check_interval: Duration::from_secs(1),
        };
        let broker = BrokerClient::connect(&redis_params, CancellationToken::new()).await.unwrap();
        let params = QueueParams {
            name: format!("test-{}", Uuid::new_v4()),
            lease_duration: lease,
            heartbeat_interval: lease / 2,
            ..test_queue_params()
        };
        (RedisJobQueue::new(broker.connection(), params), broker)
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn redis_stalled_job_is_redelivered(proof_input: Value) {
        let (queue, broker) = redis_queue(Duration::from_millis(200)).await;
        let id = queue.enqueue(proof_input.clone()).await.unwrap();

        let job = queue.acquire_lease("W1", Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(job.id, id);
        assert_eq!(job.input, proof_input);
        assert!(queue.acquire_lease("W2", Duration::from_millis(50)).await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(300)).await;
        let recovered = queue.recover_stalled().await.unwrap();
        assert_eq!(recovered, vec![StalledJob { id, attempts_made: 1, outcome: JobState::Queued }]);

        let job = queue.acquire_lease("W2", Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(job.attempts_made, 2);
        assert_matches!(queue.complete(id, "W1", json!({})).await, Err(QueueError::LeaseLost { .. }));
        assert_eq!(
            queue.complete(id, "W2", json!({ "proof": 1 })).await.unwrap(),
            TransitionOutcome::Applied(JobState::Completed)
        );
        assert_eq!(
            queue.fail(id, "W2", "late", FailureKind::Retryable).await.unwrap(),
            TransitionOutcome::AlreadyTerminal(JobState::Completed)
        );

        let job = queue.get_status(id).await.unwrap();
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.result, Some(json!({ "proof": 1 })));
        assert_eq!(queue.purge_finished(Duration::ZERO).await.unwrap(), 1);
        broker.close().await;
    }

    #[rstest]
    #[tokio::test]
    #[ignore = "requires a running Redis at REDIS_URL"]
    async fn redis_retryable_failures_exhaust_attempts(proof_input: Value) {
        let (queue, broker) = redis_queue(Duration::from_secs(5)).await;
        let id = queue.enqueue(proof_input).await.unwrap();

        queue.acquire_lease("w", Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(
            queue.fail(id, "w", "boom", FailureKind::Retryable).await.unwrap(),
            TransitionOutcome::Applied(JobState::Queued)
        );
        queue.acquire_lease("w", Duration::from_millis(100)).await.unwrap().unwrap();
        assert_eq!(
            queue.fail(id, "w", "boom", FailureKind::Retryable).await.unwrap(),
            TransitionOutcome::Applied(JobState::Failed)
        );
        assert!(queue.acquire_lease("w", Duration::from_millis(50)).await.unwrap().is_none());
        assert_eq!(queue.get_status(id).await.unwrap().error.as_deref(), Some("boom"));
        broker.close().await;
    }
}
