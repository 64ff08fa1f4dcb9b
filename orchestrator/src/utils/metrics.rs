use once_cell::sync::Lazy;
use opentelemetry::global;
use opentelemetry::metrics::{Counter, Histogram, Meter};

pub static ORCHESTRATOR_METRICS: Lazy<OrchestratorMetrics> = Lazy::new(OrchestratorMetrics::register);

/// Process-wide instruments. Without an installed meter provider they record nothing.
pub struct OrchestratorMetrics {
    pub jobs_enqueued: Counter<u64>,
    pub jobs_completed: Counter<u64>,
    pub jobs_failed: Counter<u64>,
    pub jobs_retried: Counter<u64>,
    pub stalled_jobs_recovered: Counter<u64>,
    pub leases_lost: Counter<u64>,
    pub artifact_cleanup_failures: Counter<u64>,
    pub proof_duration: Histogram<f64>,
    pub lease_acquire_latency: Histogram<f64>,
}

impl OrchestratorMetrics {
    pub fn register() -> Self {
        let meter: Meter = global::meter("crates.orchestrator.opentelemetry");

        let jobs_enqueued = meter
            .u64_counter("jobs_enqueued")
            .with_description("Count of proof jobs admitted to the queue")
            .with_unit("jobs")
            .build();

        let jobs_completed = meter
            .u64_counter("jobs_completed")
            .with_description("Count of proof jobs that reached the completed state")
            .with_unit("jobs")
            .build();

        let jobs_failed = meter
            .u64_counter("jobs_failed")
            .with_description("Count of proof jobs that failed permanently")
            .with_unit("jobs")
            .build();

        let jobs_retried = meter
            .u64_counter("jobs_retried")
            .with_description("Count of failed executions sent back to the queue")
            .with_unit("jobs")
            .build();

        let stalled_jobs_recovered = meter
            .u64_counter("stalled_jobs_recovered")
            .with_description("Count of jobs reclaimed after their lease expired")
            .with_unit("jobs")
            .build();

        let leases_lost = meter
            .u64_counter("leases_lost")
            .with_description("Count of leases a worker lost while executing a job")
            .with_unit("leases")
            .build();

        let artifact_cleanup_failures = meter
            .u64_counter("artifact_cleanup_failures")
            .with_description("Count of temporary artifacts that could not be deleted")
            .with_unit("files")
            .build();

        let proof_duration = meter
            .f64_histogram("proof_duration")
            .with_description("Wall time of one prover execution")
            .with_unit("s")
            .build();

        let lease_acquire_latency = meter
            .f64_histogram("lease_acquire_latency")
            .with_description("Time spent waiting for a job lease")
            .with_unit("ms")
            .build();

        Self {
            jobs_enqueued,
            jobs_completed,
            jobs_failed,
            jobs_retried,
            stalled_jobs_recovered,
            leases_lost,
            artifact_cleanup_failures,
            proof_duration,
            lease_acquire_latency,
        }
    }
}
