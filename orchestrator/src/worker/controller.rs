use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::executor::JobExecutor;
use super::slot::WorkerSlot;
use super::sweeper::run_sweeper;
use crate::core::config::Config;

/// Owns the worker slots and the stall sweeper of this process.
pub struct WorkerController {
    config: Arc<Config>,
    worker_id: String,
    stop_token: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerController {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            worker_id: format!("worker-{}", Uuid::new_v4()),
            stop_token: CancellationToken::new(),
            handles: Vec::new(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Spawns `worker_concurrency` slots plus the sweeper.
    pub fn start(&mut self) {
        let concurrency = self.config.service_params().worker_concurrency;
        info!(worker_id = %self.worker_id, concurrency, "Starting workers");

        let executor = JobExecutor::new(
            self.config.queue(),
            self.config.prover(),
            self.config.prover_params().scratch_dir.clone(),
            self.config.queue_params().heartbeat_interval,
        );

        for slot in 0..concurrency {
            let slot = WorkerSlot::new(
                self.config.clone(),
                executor.clone(),
                format!("{}:{slot}", self.worker_id),
                self.stop_token.clone(),
            );
            self.handles.push(tokio::spawn(slot.run()));
        }
        self.handles.push(tokio::spawn(run_sweeper(self.config.clone(), self.stop_token.clone())));
    }

    /// Stops every slot from acquiring new leases. In-flight executions keep running.
    pub fn stop_acquiring(&self) {
        self.stop_token.cancel();
    }

    /// Waits up to `grace` for in-flight executions, then aborts whatever is left.
    ///
    /// Returns true when every slot finished on its own.
    pub async fn drain(&mut self, grace: Duration) -> bool {
        self.stop_acquiring();
        let mut handles = std::mem::take(&mut self.handles);

        let drained = match tokio::time::timeout(grace, join_all(handles.iter_mut())).await {
            Ok(results) => {
                for result in results {
                    if let Err(e) = result {
                        error!(error = %e, "Worker task panicked");
                    }
                }
                true
            }
            Err(_) => false,
        };

        if !drained {
            // Handles that finished were already polled to completion by `join_all`, awaiting them again panics
            let stuck: Vec<_> = handles.into_iter().filter(|handle| !handle.is_finished()).collect();
            warn!(
                stuck = stuck.len(),
                grace_ms = grace.as_millis() as u64,
                "Grace period elapsed, abandoning in-flight executions"
            );
            for handle in &stuck {
                handle.abort();
            }
            for handle in stuck {
                let _ = handle.await;
            }
        }
        info!(worker_id = %self.worker_id, drained, "Workers stopped");
        drained
    }
}
