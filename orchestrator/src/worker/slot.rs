use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use super::executor::JobExecutor;
use crate::core::client::queue::QueueError;
use crate::core::config::Config;
use crate::utils::metrics::ORCHESTRATOR_METRICS;

const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// One execution slot: acquires a lease, runs the job, repeats.
///
/// Slots stop acquiring as soon as `stop_token` is cancelled. A job that was already leased is
/// always run to completion, cancellation never interrupts the prover.
pub struct WorkerSlot {
    config: Arc<Config>,
    executor: JobExecutor,
    worker_id: String,
    stop_token: CancellationToken,
    consecutive_errors: u32,
}

impl WorkerSlot {
    pub fn new(config: Arc<Config>, executor: JobExecutor, worker_id: String, stop_token: CancellationToken) -> Self {
        Self { config, executor, worker_id, stop_token, consecutive_errors: 0 }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub async fn run(mut self) {
        let span = tracing::info_span!("worker", worker_id = %self.worker_id);
        async move {
            info!(
                lease_wait_ms = self.config.queue_params().lease_wait.as_millis() as u64,
                "Worker slot started"
            );
            while !self.stop_token.is_cancelled() {
                if !self.config.broker_ready() {
                    debug!("Broker not ready, pausing lease acquisition");
                    self.pause(self.config.queue_params().poll_interval).await;
                    continue;
                }

                let polled = self.poll_and_execute().await;
                match polled {
                    Ok(()) => self.consecutive_errors = 0,
                    Err(e) => {
                        self.consecutive_errors = self.consecutive_errors.saturating_add(1);
                        let delay = error_backoff(self.consecutive_errors);
                        error!(
                            error = %e,
                            consecutive_errors = self.consecutive_errors,
                            backoff_ms = delay.as_millis() as u64,
                            "Queue operation failed"
                        );
                        self.pause(delay).await;
                    }
                }
            }
            info!("Worker slot stopped");
        }
        .instrument(span)
        .await
    }

    async fn poll_and_execute(&self) -> Result<(), QueueError> {
        let started = Instant::now();
        let queue = self.config.queue();
        let leased = tokio::select! {
            biased;
            _ = self.stop_token.cancelled() => return Ok(()),
            leased = queue.acquire_lease(&self.worker_id, self.config.queue_params().lease_wait) => leased?,
        };
        let Some(job) = leased else {
            return Ok(());
        };
        ORCHESTRATOR_METRICS.lease_acquire_latency.record(started.elapsed().as_secs_f64() * 1000.0, &[]);

        let job_id = job.id;
        let span = tracing::info_span!("job", job_id = %job_id);
        match self.executor.execute(job, &self.worker_id).instrument(span).await? {
            Some(transition) => debug!(job_id = %job_id, ?transition, "Execution recorded"),
            None => warn!(job_id = %job_id, "Execution result dropped after losing the lease"),
        }
        Ok(())
    }

    async fn pause(&self, delay: Duration) {
        tokio::select! {
            _ = self.stop_token.cancelled() => {}
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Exponential backoff for consecutive queue errors, capped at 30s.
fn error_backoff(consecutive_errors: u32) -> Duration {
    let exponent = consecutive_errors.saturating_sub(1).min(16);
    Duration::from_millis(100u64 << exponent).min(MAX_ERROR_BACKOFF)
}
