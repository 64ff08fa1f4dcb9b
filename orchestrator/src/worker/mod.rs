pub mod arena;
pub mod controller;
pub mod executor;
pub mod heartbeat;
pub mod outcome;
pub mod slot;
pub mod sweeper;

pub use controller::WorkerController;
pub use executor::JobExecutor;
