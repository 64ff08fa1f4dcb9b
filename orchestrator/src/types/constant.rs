/// Header carrying the shared-secret credential on admission and status requests
pub const API_KEY_HEADER: &str = "X-API-Key";

/// Artifact file name prefixes inside the scratch directory. The job id is appended.
pub const WITNESS_FILE_PREFIX: &str = "witness_";
pub const WITNESS_FILE_EXTENSION: &str = "wtns";
pub const PROOF_FILE_PREFIX: &str = "proof_";
pub const PUBLIC_SIGNALS_FILE_PREFIX: &str = "public_";

/// Error recorded on a job whose lease expired once too often
pub const STALLED_JOB_ERROR: &str = "job stalled more than allowable limit";

/// Version of the Orchestrator
pub const ORCHESTRATOR_VERSION: &str = env!("CARGO_PKG_VERSION");
