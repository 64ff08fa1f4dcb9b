use clap::Args;

/// Parameters of the proof job queue.
#[derive(Debug, Clone, Args)]
#[group()]
pub struct QueueCliArgs {
    /// Name of the queue. Used as the key prefix in Redis.
    #[arg(env = "PROOF_ORCHESTRATOR_QUEUE_NAME", long, default_value = "proof-generation")]
    pub queue_name: String,

    /// How long a worker may hold a job without renewing its lease.
    #[arg(env = "PROOF_ORCHESTRATOR_LEASE_DURATION_SECS", long, default_value = "300", value_parser = super::parse_positive_u64)]
    pub lease_duration_secs: u64,

    /// How often a running job renews its lease. Defaults to half the lease duration.
    #[arg(env = "PROOF_ORCHESTRATOR_HEARTBEAT_INTERVAL_SECS", long, value_parser = super::parse_positive_u64)]
    pub heartbeat_interval_secs: Option<u64>,

    /// How often expired leases are swept back into the queue.
    #[arg(env = "PROOF_ORCHESTRATOR_STALL_CHECK_INTERVAL_SECS", long, default_value = "30", value_parser = super::parse_positive_u64)]
    pub stall_check_interval_secs: u64,

    /// Lease acquisitions allowed per job before it fails for good.
    #[arg(env = "PROOF_ORCHESTRATOR_MAX_ATTEMPTS", long, default_value = "2", value_parser = super::parse_positive_u64)]
    pub max_attempts: u64,

    /// Longest time a single lease acquisition waits on an empty queue.
    #[arg(env = "PROOF_ORCHESTRATOR_LEASE_WAIT_MS", long, default_value = "5000")]
    pub lease_wait_ms: u64,

    /// Polling interval while waiting on an empty queue.
    #[arg(env = "PROOF_ORCHESTRATOR_POLL_INTERVAL_MS", long, default_value = "1000", value_parser = super::parse_positive_u64)]
    pub poll_interval_ms: u64,

    /// How long finished jobs are kept for status polling. 0 keeps them forever.
    #[arg(env = "PROOF_ORCHESTRATOR_JOB_RETENTION_SECS", long, default_value = "604800")]
    pub job_retention_secs: u64,
}
