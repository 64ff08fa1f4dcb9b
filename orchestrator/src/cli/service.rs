use clap::{Args, ValueEnum};

/// Which parts of the service this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    /// HTTP admission and status API only
    Api,
    /// Worker pool and stall sweeper only
    Worker,
    /// Both the API and the worker pool
    All,
}

#[derive(Debug, Clone, Args)]
pub struct ServiceCliArgs {
    /// Process role. When unset, a `DYNO` value starting with `worker` selects `all`, anything else `api`.
    #[arg(env = "PROOF_ORCHESTRATOR_ROLE", long, value_enum)]
    pub role: Option<Role>,

    /// Dyno name set by the hosting platform.
    #[arg(env = "DYNO", long, hide = true)]
    pub dyno: Option<String>,

    /// Number of jobs this process executes concurrently.
    #[arg(env = "PROOF_ORCHESTRATOR_WORKER_CONCURRENCY", long, default_value = "1", value_parser = super::parse_positive_usize)]
    pub worker_concurrency: usize,

    /// Longest time shutdown waits for in-flight jobs.
    #[arg(env = "PROOF_ORCHESTRATOR_SHUTDOWN_GRACE_SECS", long, default_value = "30")]
    pub shutdown_grace_secs: u64,
}
