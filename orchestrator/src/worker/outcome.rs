use serde_json::Value;

use crate::error::JobResult;
use crate::types::jobs::types::FailureKind;

/// What the executor will report to the queue for one execution.
///
/// Every execution result is mapped to exactly one of these before any queue call, so the retry
/// decision depends only on the outcome and the job's attempt count.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Complete(Value),
    Fail { kind: FailureKind, error: String },
}

impl ExecutionOutcome {
    pub fn classify(result: JobResult<Value>) -> Self {
        match result {
            Ok(value) => ExecutionOutcome::Complete(value),
            Err(e) => ExecutionOutcome::Fail { kind: e.failure_kind(), error: e.to_string() },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Complete(_))
    }
}
