pub mod common;

pub mod queue;


pub mod shutdown;
pub mod workers;
