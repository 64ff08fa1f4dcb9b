use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::policy::{state_after_failure, state_after_stall};
use super::types::{FailureKind, JobState, TransitionOutcome};
use crate::core::client::queue::QueueError;
use crate::types::constant::STALLED_JOB_ERROR;

/// A unit of proof generation work together with its lifecycle bookkeeping.
///
/// The transition methods below are the single source of truth for the job state machine. The
/// in-memory queue calls them directly under its lock, the Redis queue executes the same rules
/// atomically inside Lua scripts.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct JobItem {
    pub id: Uuid,
    /// Opaque computation input, stored verbatim
    pub input: Value,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
    /// Number of times a worker has leased this job
    pub attempts_made: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl JobItem {
    /// Builds a freshly admitted job in the `Queued` state.
    pub fn create(input: Value) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            input,
            state: JobState::Queued,
            result: None,
            error: None,
            lease_owner: None,
            lease_expires_at: None,
            attempts_made: 0,
            created_at: now,
            updated_at: now,
            finished_at: None,
        }
    }

    pub fn is_leased_by(&self, worker_id: &str) -> bool {
        self.state == JobState::Active && self.lease_owner.as_deref() == Some(worker_id)
    }

    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.lease_expires_at.map(|expires| expires <= now).unwrap_or(true)
    }

    pub fn acquire_lease(&mut self, worker_id: &str, lease: Duration, now: DateTime<Utc>) -> Result<(), QueueError> {
        if self.state != JobState::Queued {
            return Err(QueueError::NotAvailable { id: self.id, state: self.state });
        }
        self.state = JobState::Active;
        self.lease_owner = Some(worker_id.to_string());
        self.lease_expires_at = Some(shift_by(now, lease));
        self.attempts_made += 1;
        self.updated_at = now;
        Ok(())
    }

    /// Pushes the lease deadline forward. Only the live leaseholder may do this.
    pub fn extend_lease(
        &mut self,
        worker_id: &str,
        lease: Duration,
        now: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, QueueError> {
        if !self.is_leased_by(worker_id) || self.lease_expired(now) {
            return Err(QueueError::LeaseLost { id: self.id, worker_id: worker_id.to_string() });
        }
        let expires_at = shift_by(now, lease);
        self.lease_expires_at = Some(expires_at);
        self.updated_at = now;
        Ok(expires_at)
    }

    pub fn complete(
        &mut self,
        worker_id: &str,
        result: Value,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, QueueError> {
        if self.state.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(self.state));
        }
        if !self.is_leased_by(worker_id) {
            return Err(QueueError::LeaseLost { id: self.id, worker_id: worker_id.to_string() });
        }
        self.state = JobState::Completed;
        self.result = Some(result);
        self.error = None;
        self.finished_at = Some(now);
        self.updated_at = now;
        self.clear_lease();
        Ok(TransitionOutcome::Applied(JobState::Completed))
    }

    pub fn fail(
        &mut self,
        worker_id: &str,
        error: &str,
        kind: FailureKind,
        max_attempts: u64,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, QueueError> {
        if self.state.is_terminal() {
            return Ok(TransitionOutcome::AlreadyTerminal(self.state));
        }
        if !self.is_leased_by(worker_id) {
            return Err(QueueError::LeaseLost { id: self.id, worker_id: worker_id.to_string() });
        }
        let next = state_after_failure(kind, self.attempts_made, max_attempts);
        self.state = next;
        if next == JobState::Failed {
            self.error = Some(non_empty_error(error));
            self.finished_at = Some(now);
        }
        self.updated_at = now;
        self.clear_lease();
        Ok(TransitionOutcome::Applied(next))
    }

    /// Reclaims the job if its lease has expired. Returns the state it was moved to.
    pub fn recover_if_stalled(&mut self, max_attempts: u64, now: DateTime<Utc>) -> Option<JobState> {
        if self.state != JobState::Active || !self.lease_expired(now) {
            return None;
        }
        let next = state_after_stall(self.attempts_made, max_attempts);
        self.state = next;
        if next == JobState::Failed {
            self.error = Some(STALLED_JOB_ERROR.to_string());
            self.finished_at = Some(now);
        }
        self.updated_at = now;
        self.clear_lease();
        Some(next)
    }

    fn clear_lease(&mut self) {
        self.lease_owner = None;
        self.lease_expires_at = None;
    }
}

pub(crate) fn shift_by(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    let millis = i64::try_from(lease.as_millis()).unwrap_or(i64::MAX);
    now.checked_add_signed(chrono::Duration::milliseconds(millis)).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// A failed job must always carry a readable error.
pub(crate) fn non_empty_error(error: &str) -> String {
    let trimmed = error.trim();
    if trimmed.is_empty() {
        "job failed without an error message".to_string()
    } else {
        trimmed.to_string()
    }
}
