// Client abstractions module - the broker connection and the job queue built on top of it

pub mod broker;
pub mod queue;

// Re-export commonly used types
pub use broker::{BrokerClient, BrokerError, BrokerEvent};
pub use queue::memory::InMemoryJobQueue;
pub use queue::redis::RedisJobQueue;
pub use queue::{QueueClient, QueueError};
