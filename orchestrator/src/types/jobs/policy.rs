//! Retry policy.
//!
//! Both queue backends route every failure and every expired lease through these functions, so the
//! decision to redeliver a job depends only on the failure kind and the attempt count.
//! The Lua scripts of the Redis backend encode the same rules.

use super::types::{FailureKind, JobState};

/// State a job moves to after its leaseholder reports a failure.
pub fn state_after_failure(kind: FailureKind, attempts_made: u64, max_attempts: u64) -> JobState {
    match kind {
        FailureKind::Terminal => JobState::Failed,
        FailureKind::Retryable if attempts_made >= max_attempts => JobState::Failed,
        FailureKind::Retryable => JobState::Queued,
    }
}

/// State a job moves to when its lease expired without completion or heartbeat.
pub fn state_after_stall(attempts_made: u64, max_attempts: u64) -> JobState {
    if attempts_made >= max_attempts {
        JobState::Failed
    } else {
        JobState::Queued
    }
}
