use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::{QueueClient, QueueError};
use crate::types::jobs::job_item::{shift_by, JobItem};
use crate::types::jobs::types::{FailureKind, JobState, StalledJob, TransitionOutcome};
use crate::types::params::QueueParams;

#[derive(Default)]
struct MemoryState {
    jobs: HashMap<Uuid, JobItem>,
    queued: VecDeque<Uuid>,
    closed: bool,
}

/// Process-local queue with the same state machine as the Redis queue.
///
/// Used for tests and for running a single process without a broker.
pub struct InMemoryJobQueue {
    params: QueueParams,
    state: Mutex<MemoryState>,
    available: Notify,
}

impl InMemoryJobQueue {
    pub fn new(params: QueueParams) -> Self {
        Self { params, state: Mutex::new(MemoryState::default()), available: Notify::new() }
    }

    pub fn params(&self) -> &QueueParams {
        &self.params
    }

    pub fn is_closed(&self) -> bool {
        self.lock().map(|state| state.closed).unwrap_or(true)
    }

    /// Number of jobs currently waiting in the queue
    pub fn queued_len(&self) -> usize {
        self.lock().map(|state| state.queued.len()).unwrap_or(0)
    }

    /// Shifts a lease deadline into the past so the next stall sweep reclaims the job.
    pub fn expire_lease(&self, job_id: Uuid) -> Result<(), QueueError> {
        let mut state = self.lock()?;
        let job = state.jobs.get_mut(&job_id).ok_or(QueueError::NotFound(job_id))?;
        job.lease_expires_at = Some(Utc::now() - chrono::Duration::milliseconds(1));
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, QueueError> {
        self.state.lock().map_err(|e| QueueError::LockPoisoned(e.to_string()))
    }

    fn try_acquire(&self, worker_id: &str) -> Result<Option<JobItem>, QueueError> {
        let mut state = self.lock()?;
        if state.closed {
            return Err(QueueError::Unavailable("queue is closed".to_string()));
        }
        let now = Utc::now();
        while let Some(id) = state.queued.pop_front() {
            let Some(job) = state.jobs.get_mut(&id) else { continue };
            // Entries can go stale when a purge or a terminal transition races the list.
            if job.state != JobState::Queued {
                continue;
            }
            job.acquire_lease(worker_id, self.params.lease_duration, now)?;
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    fn with_job<T>(
        &self,
        job_id: Uuid,
        f: impl FnOnce(&mut JobItem, DateTime<Utc>) -> Result<T, QueueError>,
    ) -> Result<(T, JobState), QueueError> {
        let mut state = self.lock()?;
        let job = state.jobs.get_mut(&job_id).ok_or(QueueError::NotFound(job_id))?;
        let value = f(job, Utc::now())?;
        let job_state = job.state;
        if job_state == JobState::Queued {
            state.queued.push_back(job_id);
        }
        Ok((value, job_state))
    }
}

#[async_trait]
impl QueueClient for InMemoryJobQueue {
    async fn enqueue(&self, input: Value) -> Result<Uuid, QueueError> {
        let job = JobItem::create(input);
        let id = job.id;
        {
            let mut state = self.lock()?;
            if state.closed {
                return Err(QueueError::Unavailable("queue is closed".to_string()));
            }
            state.jobs.insert(id, job);
            state.queued.push_back(id);
        }
        self.available.notify_waiters();
        debug!(job_id = %id, "Job enqueued");
        Ok(id)
    }

    async fn acquire_lease(&self, worker_id: &str, wait: Duration) -> Result<Option<JobItem>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.available.notified();
            if let Some(job) = self.try_acquire(worker_id)? {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let nap = self.params.poll_interval.min(deadline - now);
            tokio::select! {
                _ = notified => {}
                _ = tokio::time::sleep(nap) => {}
            }
        }
    }

    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<DateTime<Utc>, QueueError> {
        let lease = self.params.lease_duration;
        let (expires_at, _) = self.with_job(job_id, |job, now| job.extend_lease(worker_id, lease, now))?;
        Ok(expires_at)
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str, result: Value) -> Result<TransitionOutcome, QueueError> {
        let (outcome, _) = self.with_job(job_id, |job, now| job.complete(worker_id, result, now))?;
        Ok(outcome)
    }

    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: FailureKind,
    ) -> Result<TransitionOutcome, QueueError> {
        let max_attempts = self.params.max_attempts;
        let (outcome, state) =
            self.with_job(job_id, |job, now| job.fail(worker_id, error, kind, max_attempts, now))?;
        if state == JobState::Queued {
            self.available.notify_waiters();
        }
        Ok(outcome)
    }

    async fn recover_stalled(&self) -> Result<Vec<StalledJob>, QueueError> {
        let now = Utc::now();
        let mut recovered = Vec::new();
        {
            let mut state = self.lock()?;
            let MemoryState { jobs, queued, .. } = &mut *state;
            for job in jobs.values_mut() {
                if let Some(outcome) = job.recover_if_stalled(self.params.max_attempts, now) {
                    if outcome == JobState::Queued {
                        queued.push_back(job.id);
                    }
                    recovered.push(StalledJob { id: job.id, attempts_made: job.attempts_made, outcome });
                }
            }
        }
        if recovered.iter().any(|job| job.outcome == JobState::Queued) {
            self.available.notify_waiters();
        }
        Ok(recovered)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<JobItem, QueueError> {
        self.lock()?.jobs.get(&job_id).cloned().ok_or(QueueError::NotFound(job_id))
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<u64, QueueError> {
        let now = Utc::now();
        let mut state = self.lock()?;
        let before = state.jobs.len();
        state.jobs.retain(|_, job| match (job.state.is_terminal(), job.finished_at) {
            (true, Some(finished_at)) => shift_by(finished_at, older_than) > now,
            _ => true,
        });
        Ok((before - state.jobs.len()) as u64)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Unavailable("queue is closed".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        self.lock()?.closed = true;
        self.available.notify_waiters();
        info!("In-memory job queue closed");
        Ok(())
    }
}
