pub mod prover;
pub mod queue;
pub mod redis;
pub mod service;

pub use prover::ProverParams;
pub use queue::QueueParams;
pub use self::redis::RedisParams;
pub use service::{ServerParams, ServiceParams};
