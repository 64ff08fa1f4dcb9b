use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::core::config::Config;
use crate::types::jobs::types::JobState;
use crate::utils::metrics::ORCHESTRATOR_METRICS;

/// Periodic stall detection and retention purge.
///
/// Any number of processes may sweep concurrently. Each recovery and purge is atomic against the
/// store, so overlapping sweeps never reclaim the same job twice.
pub async fn run_sweeper(config: Arc<Config>, stop_token: CancellationToken) {
    let params = config.queue_params().clone();
    let span = tracing::info_span!("sweeper");
    async move {
        info!(
            interval_secs = params.stall_check_interval.as_secs(),
            retention_secs = params.retention.map(|r| r.as_secs()),
            "Stall sweeper started"
        );
        loop {
            tokio::select! {
                _ = stop_token.cancelled() => break,
                _ = tokio::time::sleep(params.stall_check_interval) => {}
            }
            sweep_once(&config).await;
        }
        info!("Stall sweeper stopped");
    }
    .instrument(span)
    .await
}

/// One pass of stall recovery followed by the retention purge.
pub async fn sweep_once(config: &Config) {
    match config.queue().recover_stalled().await {
        Ok(recovered) => {
            for job in &recovered {
                ORCHESTRATOR_METRICS.stalled_jobs_recovered.add(1, &[]);
                match job.outcome {
                    JobState::Failed => {
                        ORCHESTRATOR_METRICS.jobs_failed.add(1, &[]);
                        warn!(job_id = %job.id, attempts_made = job.attempts_made, "Stalled job ran out of attempts");
                    }
                    _ => info!(job_id = %job.id, attempts_made = job.attempts_made, "Stalled job re-queued"),
                }
            }
        }
        Err(e) => warn!(error = %e, "Stall recovery failed"),
    }

    if let Some(retention) = config.queue_params().retention {
        match config.queue().purge_finished(retention).await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged finished jobs"),
            Err(e) => warn!(error = %e, "Retention purge failed"),
        }
    }
}
