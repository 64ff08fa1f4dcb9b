//! Redis-backed job queue.
//!
//! # Layout
//!
//! - `{queue}:job:{id}`: hash holding one job record
//! - `{queue}:queued`: list of job ids waiting for a lease (LPUSH in, RPOP out)
//! - `{queue}:active`: sorted set of leased job ids scored by lease expiry (ms)
//! - `{queue}:finished`: sorted set of terminal job ids scored by finish time (ms)
//!
//! Every transition runs as a single Lua script, so lease checks and state writes are atomic
//! against the store. Lease deadlines come from the Redis clock, not from the workers'.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{QueueClient, QueueError};
use crate::types::constant::STALLED_JOB_ERROR;
use crate::types::jobs::job_item::{non_empty_error, JobItem};
use crate::types::jobs::types::{FailureKind, JobState, StalledJob, TransitionOutcome};
use crate::types::params::QueueParams;

/// Upper bound on jobs touched by one stall or purge script run
const SWEEP_BATCH_SIZE: usize = 500;

struct QueueKeys {
    job_prefix: String,
    queued: String,
    active: String,
    finished: String,
}

impl QueueKeys {
    fn new(queue_name: &str) -> Self {
        Self {
            job_prefix: format!("{}:job:", queue_name),
            queued: format!("{}:queued", queue_name),
            active: format!("{}:active", queue_name),
            finished: format!("{}:finished", queue_name),
        }
    }

    fn job(&self, id: Uuid) -> String {
        format!("{}{}", self.job_prefix, id)
    }
}

struct QueueScripts {
    acquire: Script,
    heartbeat: Script,
    complete: Script,
    fail: Script,
    stalled: Script,
    purge: Script,
}

impl QueueScripts {
    fn load() -> Self {
        Self {
            acquire: Script::new(include_str!("scripts/acquire.lua")),
            heartbeat: Script::new(include_str!("scripts/heartbeat.lua")),
            complete: Script::new(include_str!("scripts/complete.lua")),
            fail: Script::new(include_str!("scripts/fail.lua")),
            stalled: Script::new(include_str!("scripts/stalled.lua")),
            purge: Script::new(include_str!("scripts/purge.lua")),
        }
    }
}

pub struct RedisJobQueue {
    connection: ConnectionManager,
    params: QueueParams,
    keys: QueueKeys,
    scripts: QueueScripts,
    closed: AtomicBool,
}

impl RedisJobQueue {
    pub fn new(connection: ConnectionManager, params: QueueParams) -> Self {
        let keys = QueueKeys::new(&params.name);
        Self { connection, params, keys, scripts: QueueScripts::load(), closed: AtomicBool::new(false) }
    }

    fn ensure_open(&self) -> Result<(), QueueError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(QueueError::Unavailable("queue is closed".to_string()));
        }
        Ok(())
    }

    async fn try_acquire(&self, worker_id: &str) -> Result<Option<JobItem>, QueueError> {
        let mut conn = self.connection.clone();
        let record: Option<HashMap<String, String>> = self
            .scripts
            .acquire
            .key(&self.keys.queued)
            .key(&self.keys.active)
            .arg(&self.keys.job_prefix)
            .arg(worker_id)
            .arg(duration_millis(self.params.lease_duration))
            .invoke_async(&mut conn)
            .await?;
        record.map(job_from_hash).transpose()
    }
}

#[async_trait]
impl QueueClient for RedisJobQueue {
    async fn enqueue(&self, input: Value) -> Result<Uuid, QueueError> {
        self.ensure_open()?;
        let job = JobItem::create(input);
        let fields = job_to_hash(&job)?;
        let mut conn = self.connection.clone();

        redis::pipe()
            .atomic()
            .hset_multiple(self.keys.job(job.id), fields.as_slice())
            .ignore()
            .lpush(&self.keys.queued, job.id.to_string())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;

        debug!(job_id = %job.id, queue = %self.params.name, "Job enqueued");
        Ok(job.id)
    }

    async fn acquire_lease(&self, worker_id: &str, wait: Duration) -> Result<Option<JobItem>, QueueError> {
        let deadline = Instant::now() + wait;
        loop {
            self.ensure_open()?;
            if let Some(job) = self.try_acquire(worker_id).await? {
                return Ok(Some(job));
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.params.poll_interval.min(deadline - now)).await;
        }
    }

    async fn heartbeat(&self, job_id: Uuid, worker_id: &str) -> Result<DateTime<Utc>, QueueError> {
        let mut conn = self.connection.clone();
        let reply: Vec<String> = self
            .scripts
            .heartbeat
            .key(self.keys.job(job_id))
            .key(&self.keys.active)
            .arg(worker_id)
            .arg(duration_millis(self.params.lease_duration))
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await?;

        match reply.as_slice() {
            [status, expires] if status == "ok" => {
                parse_millis(&job_id.to_string(), "lease_expires_at", expires)
            }
            [status] if status == "lease_lost" => {
                Err(QueueError::LeaseLost { id: job_id, worker_id: worker_id.to_string() })
            }
            [status] if status == "not_found" => Err(QueueError::NotFound(job_id)),
            other => Err(unexpected_reply(job_id, other)),
        }
    }

    async fn complete(&self, job_id: Uuid, worker_id: &str, result: Value) -> Result<TransitionOutcome, QueueError> {
        let payload = serde_json::to_string(&result)?;
        let mut conn = self.connection.clone();
        let reply: Vec<String> = self
            .scripts
            .complete
            .key(self.keys.job(job_id))
            .key(&self.keys.active)
            .key(&self.keys.finished)
            .arg(worker_id)
            .arg(payload)
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        transition_from_reply(job_id, worker_id, &reply)
    }

    async fn fail(
        &self,
        job_id: Uuid,
        worker_id: &str,
        error: &str,
        kind: FailureKind,
    ) -> Result<TransitionOutcome, QueueError> {
        let terminal = if kind == FailureKind::Terminal { "1" } else { "0" };
        let mut conn = self.connection.clone();
        let reply: Vec<String> = self
            .scripts
            .fail
            .key(self.keys.job(job_id))
            .key(&self.keys.active)
            .key(&self.keys.finished)
            .key(&self.keys.queued)
            .arg(worker_id)
            .arg(non_empty_error(error))
            .arg(terminal)
            .arg(self.params.max_attempts)
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        transition_from_reply(job_id, worker_id, &reply)
    }

    async fn recover_stalled(&self) -> Result<Vec<StalledJob>, QueueError> {
        let mut conn = self.connection.clone();
        let mut recovered = Vec::new();
        loop {
            let reply: Vec<String> = self
                .scripts
                .stalled
                .key(&self.keys.active)
                .key(&self.keys.finished)
                .key(&self.keys.queued)
                .arg(&self.keys.job_prefix)
                .arg(self.params.max_attempts)
                .arg(STALLED_JOB_ERROR)
                .arg(SWEEP_BATCH_SIZE)
                .invoke_async(&mut conn)
                .await?;

            let batch_len = reply.len() / 3;
            for triple in reply.chunks_exact(3) {
                recovered.push(stalled_from_triple(triple)?);
            }
            if batch_len < SWEEP_BATCH_SIZE {
                break;
            }
        }
        Ok(recovered)
    }

    async fn get_status(&self, job_id: Uuid) -> Result<JobItem, QueueError> {
        let mut conn = self.connection.clone();
        let record: HashMap<String, String> = conn.hgetall(self.keys.job(job_id)).await?;
        if record.is_empty() {
            return Err(QueueError::NotFound(job_id));
        }
        job_from_hash(record)
    }

    async fn purge_finished(&self, older_than: Duration) -> Result<u64, QueueError> {
        let mut conn = self.connection.clone();
        let mut purged: u64 = 0;
        loop {
            let removed: u64 = self
                .scripts
                .purge
                .key(&self.keys.finished)
                .arg(&self.keys.job_prefix)
                .arg(duration_millis(older_than))
                .arg(SWEEP_BATCH_SIZE)
                .invoke_async(&mut conn)
                .await?;
            purged += removed;
            if removed < SWEEP_BATCH_SIZE as u64 {
                break;
            }
        }
        Ok(purged)
    }

    async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.connection.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<(), QueueError> {
        if !self.closed.swap(true, Ordering::AcqRel) {
            info!(queue = %self.params.name, "Redis job queue closed");
        }
        Ok(())
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn job_to_hash(job: &JobItem) -> Result<Vec<(&'static str, String)>, QueueError> {
    let mut fields = vec![
        ("id", job.id.to_string()),
        ("input", serde_json::to_string(&job.input)?),
        ("state", job.state.to_string()),
        ("attempts_made", job.attempts_made.to_string()),
        ("created_at", job.created_at.timestamp_millis().to_string()),
        ("updated_at", job.updated_at.timestamp_millis().to_string()),
    ];
    if let Some(result) = &job.result {
        fields.push(("result", serde_json::to_string(result)?));
    }
    if let Some(error) = &job.error {
        fields.push(("error", error.clone()));
    }
    Ok(fields)
}

fn job_from_hash(mut record: HashMap<String, String>) -> Result<JobItem, QueueError> {
    let raw_id = record.remove("id").unwrap_or_default();
    let corrupt = |reason: String| QueueError::CorruptRecord { id: raw_id.clone(), reason };

    let id = Uuid::parse_str(&raw_id).map_err(|e| corrupt(format!("invalid id: {e}")))?;
    let input: Value = record
        .get("input")
        .map(|raw| serde_json::from_str(raw))
        .transpose()
        .map_err(|e| corrupt(format!("invalid input: {e}")))?
        .ok_or_else(|| corrupt("missing input".to_string()))?;
    let state = record
        .get("state")
        .map(|raw| JobState::from_str(raw))
        .transpose()
        .map_err(|e| corrupt(format!("invalid state: {e}")))?
        .ok_or_else(|| corrupt("missing state".to_string()))?;
    let result: Option<Value> = record
        .get("result")
        .map(|raw| serde_json::from_str(raw))
        .transpose()
        .map_err(|e| corrupt(format!("invalid result: {e}")))?;
    let attempts_made = match record.get("attempts_made") {
        Some(raw) => raw.parse().map_err(|e| corrupt(format!("invalid attempts_made: {e}")))?,
        None => 0,
    };
    let millis = |field: &str| record.get(field).map(|raw| parse_millis(&raw_id, field, raw)).transpose();
    let created_at = millis("created_at")?.ok_or_else(|| corrupt("missing created_at".to_string()))?;

    Ok(JobItem {
        id,
        input,
        state,
        result,
        error: record.get("error").cloned(),
        lease_owner: record.get("lease_owner").cloned(),
        lease_expires_at: millis("lease_expires_at")?,
        attempts_made,
        created_at,
        updated_at: millis("updated_at")?.unwrap_or(created_at),
        finished_at: millis("finished_at")?,
    })
}

fn parse_millis(id: &str, field: &str, raw: &str) -> Result<DateTime<Utc>, QueueError> {
    raw.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis).ok_or_else(|| QueueError::CorruptRecord {
        id: id.to_string(),
        reason: format!("invalid {field}: {raw}"),
    })
}

fn transition_from_reply(job_id: Uuid, worker_id: &str, reply: &[String]) -> Result<TransitionOutcome, QueueError> {
    let parse_state = |raw: &str| JobState::from_str(raw).map_err(|_| unexpected_reply(job_id, reply));
    match reply {
        [status, state] if status == "applied" => Ok(TransitionOutcome::Applied(parse_state(state)?)),
        [status, state] if status == "already_terminal" => {
            Ok(TransitionOutcome::AlreadyTerminal(parse_state(state)?))
        }
        [status] if status == "lease_lost" => {
            Err(QueueError::LeaseLost { id: job_id, worker_id: worker_id.to_string() })
        }
        [status] if status == "not_found" => Err(QueueError::NotFound(job_id)),
        other => Err(unexpected_reply(job_id, other)),
    }
}

fn stalled_from_triple(triple: &[String]) -> Result<StalledJob, QueueError> {
    let corrupt = |reason: &str| QueueError::CorruptRecord { id: triple[0].clone(), reason: reason.to_string() };
    let id = Uuid::parse_str(&triple[0]).map_err(|_| corrupt("invalid id in active set"))?;
    let attempts_made = triple[1].parse().map_err(|_| corrupt("invalid attempts_made"))?;
    let outcome = JobState::from_str(&triple[2]).map_err(|_| corrupt("invalid state"))?;
    if outcome == JobState::Failed {
        warn!(job_id = %id, attempts_made, "Stalled job exhausted its attempts");
    }
    Ok(StalledJob { id, attempts_made, outcome })
}

fn unexpected_reply(job_id: Uuid, reply: &[String]) -> QueueError {
    QueueError::CorruptRecord { id: job_id.to_string(), reason: format!("unexpected script reply {reply:?}") }
}
