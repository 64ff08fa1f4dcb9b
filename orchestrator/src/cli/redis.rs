use clap::Args;

/// Parameters used to connect to the Redis broker.
#[derive(Debug, Clone, Args)]
#[group()]
pub struct RedisCliArgs {
    /// The Redis connection URL (`redis://` or `rediss://`).
    #[arg(env = "REDIS_URL", long)]
    pub redis_url: Option<String>,

    /// Fallback TLS connection URL, used only when no plain URL is configured.
    #[arg(env = "REDIS_TLS_URL", long)]
    pub redis_tls_url: Option<String>,

    /// Base delay of the reconnect backoff, multiplied by the attempt number.
    #[arg(env = "PROOF_ORCHESTRATOR_REDIS_BACKOFF_BASE_MS", long, default_value = "100", value_parser = super::parse_positive_u64)]
    pub redis_backoff_base_ms: u64,

    /// Upper bound of the reconnect backoff.
    #[arg(env = "PROOF_ORCHESTRATOR_REDIS_BACKOFF_CAP_MS", long, default_value = "3000", value_parser = super::parse_positive_u64)]
    pub redis_backoff_cap_ms: u64,

    /// How often the broker connection is probed with PING.
    #[arg(env = "PROOF_ORCHESTRATOR_REDIS_HEALTH_CHECK_INTERVAL_MS", long, default_value = "5000", value_parser = super::parse_positive_u64)]
    pub redis_health_check_interval_ms: u64,
}
