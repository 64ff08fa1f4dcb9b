use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(
    Serialize,
    Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobState {
    /// The job has been accepted and is waiting for a worker to lease it
    Queued,
    /// A worker holds a lease on the job and is running the computation
    Active,
    /// The computation finished and the result is stored on the job
    Completed,
    /// The job failed permanently, the error is stored on the job
    Failed,
}

impl JobState {
    /// Terminal states are final, no transition ever leaves them
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// How a failed execution should count against the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Re-enters the queue while attempts remain
    Retryable,
    /// Fails the job regardless of remaining attempts
    Terminal,
}

/// Result of a `complete`/`fail` call against the queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// The transition happened, the job is now in the given state
    Applied(JobState),
    /// The job had already reached the given terminal state, nothing changed
    AlreadyTerminal(JobState),
}

/// A job reclaimed by the stall detector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledJob {
    pub id: Uuid,
    pub attempts_made: u64,
    /// `Queued` when redelivered, `Failed` when the attempt bound was reached
    pub outcome: JobState,
}
