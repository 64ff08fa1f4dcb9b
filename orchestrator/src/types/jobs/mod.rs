pub mod job_item;
pub mod policy;
pub mod types;
