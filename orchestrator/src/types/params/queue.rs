use std::time::Duration;

use crate::cli::queue::QueueCliArgs;
use crate::OrchestratorError;

#[derive(Debug, Clone)]
pub struct QueueParams {
    pub name: String,
    pub lease_duration: Duration,
    pub heartbeat_interval: Duration,
    pub stall_check_interval: Duration,
    /// Bound on lease acquisitions, shared by retryable failures and stall recoveries
    pub max_attempts: u64,
    pub lease_wait: Duration,
    pub poll_interval: Duration,
    /// `None` keeps finished jobs forever
    pub retention: Option<Duration>,
}

impl Default for QueueParams {
    fn default() -> Self {
        Self {
            name: "proof-generation".to_string(),
            lease_duration: Duration::from_secs(300),
            heartbeat_interval: Duration::from_secs(150),
            stall_check_interval: Duration::from_secs(30),
            max_attempts: 2,
            lease_wait: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(1000),
            retention: Some(Duration::from_secs(604_800)),
        }
    }
}

impl TryFrom<QueueCliArgs> for QueueParams {
    type Error = OrchestratorError;

    fn try_from(args: QueueCliArgs) -> Result<Self, Self::Error> {
        let lease_duration = Duration::from_secs(args.lease_duration_secs);
        let heartbeat_interval =
            args.heartbeat_interval_secs.map(Duration::from_secs).unwrap_or_else(|| lease_duration / 2);

        if heartbeat_interval >= lease_duration {
            return Err(OrchestratorError::ConfigError(format!(
                "heartbeat interval ({}s) must be shorter than the lease duration ({}s)",
                heartbeat_interval.as_secs(),
                lease_duration.as_secs()
            )));
        }
        if args.queue_name.trim().is_empty() {
            return Err(OrchestratorError::ConfigError("queue name must not be empty".to_string()));
        }

        Ok(Self {
            name: args.queue_name,
            lease_duration,
            heartbeat_interval,
            stall_check_interval: Duration::from_secs(args.stall_check_interval_secs),
            max_attempts: args.max_attempts,
            lease_wait: Duration::from_millis(args.lease_wait_ms),
            poll_interval: Duration::from_millis(args.poll_interval_ms),
            retention: (args.job_retention_secs > 0).then(|| Duration::from_secs(args.job_retention_secs)),
        })
    }
}
