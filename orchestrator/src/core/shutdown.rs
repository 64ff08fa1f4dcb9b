use std::sync::Arc;

use tracing::{error, info, warn};

use crate::core::config::Config;
use crate::server::ServerHandle;
use crate::worker::WorkerController;

/// What happened during shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// False when the grace period ran out with executions still in flight
    pub workers_drained: bool,
}

/// Tears the process down in a fixed order.
///
/// 1. Worker slots stop acquiring leases.
/// 2. The HTTP server stops accepting connections and finishes in-flight requests.
/// 3. In-flight executions get up to the configured grace period to reach a terminal state.
/// 4. The queue and the broker connection are closed, whether or not step 3 finished.
pub struct ShutdownCoordinator {
    config: Arc<Config>,
    server: Option<ServerHandle>,
    workers: Option<WorkerController>,
}

impl ShutdownCoordinator {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config, server: None, workers: None }
    }

    pub fn with_server(mut self, server: ServerHandle) -> Self {
        self.server = Some(server);
        self
    }

    pub fn with_workers(mut self, workers: WorkerController) -> Self {
        self.workers = Some(workers);
        self
    }

    pub async fn shutdown(self) -> ShutdownReport {
        let Self { config, server, workers } = self;
        let grace = config.service_params().shutdown_grace;

        if let Some(workers) = workers.as_ref() {
            info!(worker_id = %workers.worker_id(), "Stopping lease acquisition");
            workers.stop_acquiring();
        }

        if let Some(server) = server {
            if let Err(e) = server.shutdown().await {
                error!(error = %e, "HTTP server task failed during shutdown");
            }
        }

        let workers_drained = match workers {
            Some(mut workers) => workers.drain(grace).await,
            None => true,
        };
        if !workers_drained {
            warn!("Closing the queue with executions still in flight, their leases will expire and be reclaimed");
        }

        if let Err(e) = config.queue().close().await {
            error!(error = %e, "Failed to close the job queue");
        }
        if let Some(broker) = config.broker() {
            broker.close().await;
        }

        info!(workers_drained, "Shutdown complete");
        ShutdownReport { workers_drained }
    }
}
