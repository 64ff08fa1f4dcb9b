use std::time::Duration;

use crate::cli::redis::RedisCliArgs;

#[derive(Debug, Clone)]
pub struct RedisParams {
    /// `None` when neither `REDIS_URL` nor `REDIS_TLS_URL` is set. Connecting then fails fast.
    pub url: Option<String>,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub health_check_interval: Duration,
}

impl From<RedisCliArgs> for RedisParams {
    fn from(args: RedisCliArgs) -> Self {
        let url = args
            .redis_url
            .filter(|url| !url.trim().is_empty())
            .or(args.redis_tls_url)
            .filter(|url| !url.trim().is_empty());
        Self {
            url,
            backoff_base: Duration::from_millis(args.redis_backoff_base_ms),
            backoff_cap: Duration::from_millis(args.redis_backoff_cap_ms),
            health_check_interval: Duration::from_millis(args.redis_health_check_interval_ms),
        }
    }
}

impl RedisParams {
    /// Delay before reconnect attempt `attempt` (1-based): `min(attempt * base, cap)`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt).min(self.backoff_cap)
    }
}
