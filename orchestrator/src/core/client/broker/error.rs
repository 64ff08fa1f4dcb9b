use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrokerError {
    #[error("No broker URL configured, set REDIS_URL or REDIS_TLS_URL")]
    MissingUrl,

    #[error("Invalid broker URL: {0}")]
    InvalidUrl(#[source] redis::RedisError),

    #[error("Broker connection cancelled before it was established")]
    Cancelled,

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}
