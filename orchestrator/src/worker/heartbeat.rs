use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::core::client::queue::{QueueClient, QueueError};
use crate::utils::metrics::ORCHESTRATOR_METRICS;

/// Background timer that keeps a job lease alive while the prover runs.
///
/// Transient broker errors are retried on the next tick. If the queue reports the lease as lost
/// the keeper stops for good and [`LeaseKeeper::lease_lost`] turns true.
pub struct LeaseKeeper {
    token: CancellationToken,
    lost: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LeaseKeeper {
    pub fn spawn(queue: Arc<dyn QueueClient>, job_id: Uuid, worker_id: String, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let lost = Arc::new(AtomicBool::new(false));
        let handle = tokio::spawn(keep_alive(queue, job_id, worker_id, interval, token.clone(), lost.clone()));
        Self { token, lost, handle: Some(handle) }
    }

    pub fn lease_lost(&self) -> bool {
        self.lost.load(Ordering::Acquire)
    }

    /// Stops the timer and returns whether the lease was lost while it ran.
    pub async fn stop(mut self) -> bool {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!(error = %e, "Lease keeper task panicked");
            }
        }
        self.lost.load(Ordering::Acquire)
    }
}

impl Drop for LeaseKeeper {
    fn drop(&mut self) {
        // An aborted execution must not keep the lease alive
        self.token.cancel();
    }
}

async fn keep_alive(
    queue: Arc<dyn QueueClient>,
    job_id: Uuid,
    worker_id: String,
    interval: Duration,
    token: CancellationToken,
    lost: Arc<AtomicBool>,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }

        match queue.heartbeat(job_id, &worker_id).await {
            Ok(expires_at) => debug!(job_id = %job_id, worker_id = %worker_id, %expires_at, "Lease extended"),
            Err(e @ (QueueError::LeaseLost { .. } | QueueError::NotFound(_))) => {
                ORCHESTRATOR_METRICS.leases_lost.add(1, &[]);
                warn!(job_id = %job_id, worker_id = %worker_id, error = %e, "Lease lost, further updates to this job will be dropped");
                lost.store(true, Ordering::Release);
                return;
            }
            Err(e) => {
                warn!(job_id = %job_id, worker_id = %worker_id, error = %e, "Heartbeat failed, retrying on next tick");
            }
        }
    }
}
