//! Worker execution loop.
//!
//! Claims one job at a time, runs its handler to completion and records the
//! outcome with a write guarded by the worker's own lease. Shutdown is only
//! observed between jobs, so an in-flight handler always finishes.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value as JsonValue, json};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::JobsConfig;
use crate::error::AppResult;
use crate::jobs::audit::AuditLog;
use crate::jobs::claim::claim_next;
use crate::jobs::clock::Clock;
use crate::jobs::registry::{HandlerRegistry, TaskRequest};
use crate::jobs::retry::{FailureDecision, RetryPolicy};
use crate::jobs::store::{Failure, JobStore, Lease};
use crate::models::{Job, JobStatus, LogLevel};

/// How a processed job ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Done,
    /// Soft failure with retries left
    Retrying { next_attempt_after: i64 },
    /// Soft failure on the last allowed attempt
    DeadLettered,
    /// No handler for the task type
    HandlerMissing,
    /// The lease was lost before the outcome could be written
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOptions {
    pub worker_id: String,
    pub lease_duration_ms: i64,
    pub poll_interval: Duration,
    pub error_backoff: Duration,
    pub claim_attempts: u32,
}

impl WorkerOptions {
    pub fn from_config(worker_id: impl Into<String>, config: &JobsConfig) -> Self {
        Self {
            worker_id: worker_id.into(),
            lease_duration_ms: i64::try_from(config.lease_duration_ms).unwrap_or(i64::MAX),
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            claim_attempts: config.claim_attempts,
        }
    }
}

/// Default worker identity.
pub fn generate_worker_id() -> String {
    format!("worker-{}", Uuid::new_v4())
}

pub struct Worker {
    options: WorkerOptions,
    store: Arc<dyn JobStore>,
    registry: Arc<HandlerRegistry>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
}

impl Worker {
    pub fn new(
        options: WorkerOptions,
        store: Arc<dyn JobStore>,
        registry: Arc<HandlerRegistry>,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            options,
            store,
            registry,
            audit,
            clock,
            retry,
        }
    }

    pub fn id(&self) -> &str {
        &self.options.worker_id
    }

    /// Claim and fully process at most one job.
    pub async fn run_once(&self) -> AppResult<Option<(Uuid, JobOutcome)>> {
        let now = self.clock.now_ms();
        let lease = Lease {
            worker_id: self.options.worker_id.clone(),
            now,
            until: now.saturating_add(self.options.lease_duration_ms),
        };

        let Some(job) = claim_next(self.store.as_ref(), &lease, self.options.claim_attempts).await?
        else {
            return Ok(None);
        };

        tracing::info!(
            job_id = %job.id,
            task_type = %job.task_type,
            worker_id = %self.options.worker_id,
            "Job claimed"
        );
        self.audit
            .job(
                job.id,
                LogLevel::Info,
                format!(
                    "Worker {} started handler for job {} type {}",
                    self.options.worker_id, job.id, job.task_type
                ),
            )
            .await;

        let id = job.id;
        let outcome = self.process(job).await?;
        Ok(Some((id, outcome)))
    }

    /// Run a claimed job's handler and record its outcome.
    pub async fn process(&self, job: Job) -> AppResult<JobOutcome> {
        let worker_id = self.options.worker_id.as_str();

        let Some(handler) = self.registry.get(&job.task_type) else {
            return self.fail_missing_handler(&job).await;
        };

        let payload = serde_json::from_str::<JsonValue>(&job.payload)
            .unwrap_or_else(|_| JsonValue::String(job.payload.clone()));

        if !self
            .store
            .mark_processing(job.id, worker_id, self.clock.now_ms())
            .await?
        {
            return Ok(self.discard(job.id).await);
        }

        let request = TaskRequest {
            job_id: job.id,
            owner_id: job.owner_id.clone(),
            task_type: job.task_type.clone(),
            payload,
            worker_id: worker_id.to_string(),
        };

        // A panicking handler fails the attempt instead of the worker.
        let result = tokio::spawn(async move { handler.execute(request).await })
            .await
            .map_err(|e| format!("handler panicked: {}", e))
            .and_then(|r| r.map_err(|e| e.to_string()));

        match result {
            Ok(value) => self.complete(&job, &value).await,
            Err(message) => self.fail(&job, message).await,
        }
    }

    async fn complete(&self, job: &Job, value: &JsonValue) -> AppResult<JobOutcome> {
        let worker_id = self.options.worker_id.as_str();
        let finished_at = self.clock.now_ms();

        if !self
            .store
            .mark_done(job.id, worker_id, &value.to_string(), finished_at)
            .await?
        {
            return Ok(self.discard(job.id).await);
        }

        tracing::info!(job_id = %job.id, worker_id, "Job completed");
        self.audit
            .job_with_meta(
                job.id,
                LogLevel::Info,
                "handler processed successfully",
                json!({ "workerId": worker_id }),
            )
            .await;
        Ok(JobOutcome::Done)
    }

    async fn fail(&self, job: &Job, message: String) -> AppResult<JobOutcome> {
        let worker_id = self.options.worker_id.as_str();
        let finished_at = self.clock.now_ms();
        let retries = job.retries.saturating_add(1);

        let (status, next_attempt_after) = match self.retry.decide(job.retries, job.max_retries) {
            FailureDecision::Retry { delay_ms } => (
                JobStatus::Failed,
                Some(finished_at.saturating_add(i64::try_from(delay_ms).unwrap_or(i64::MAX))),
            ),
            FailureDecision::DeadLetter => (JobStatus::Dlq, None),
        };

        let failure = Failure {
            status,
            error: message.clone(),
            finished_at,
            next_attempt_after,
        };
        if !self.store.mark_failed(job.id, worker_id, &failure).await? {
            return Ok(self.discard(job.id).await);
        }

        self.audit
            .job_with_meta(
                job.id,
                LogLevel::Error,
                format!("handler-error: {}", message),
                json!({
                    "workerId": worker_id,
                    "retries": retries,
                    "nextAttemptAfter": next_attempt_after,
                }),
            )
            .await;

        match next_attempt_after {
            Some(next_attempt_after) => {
                tracing::warn!(
                    job_id = %job.id,
                    worker_id,
                    retries,
                    next_attempt_after,
                    error = %message,
                    "Job failed, retry scheduled"
                );
                Ok(JobOutcome::Retrying { next_attempt_after })
            }
            None => {
                tracing::error!(
                    job_id = %job.id,
                    worker_id,
                    retries,
                    error = %message,
                    "Job exhausted its retries"
                );
                self.audit
                    .job_with_meta(
                        job.id,
                        LogLevel::Error,
                        "moved to dlq",
                        json!({ "workerId": worker_id, "retries": retries }),
                    )
                    .await;
                Ok(JobOutcome::DeadLettered)
            }
        }
    }

    async fn fail_missing_handler(&self, job: &Job) -> AppResult<JobOutcome> {
        let worker_id = self.options.worker_id.as_str();
        let message = format!("handler-missing: {}", job.task_type);
        let failure = Failure {
            status: JobStatus::Dlq,
            error: message.clone(),
            finished_at: self.clock.now_ms(),
            next_attempt_after: None,
        };

        if !self.store.mark_failed(job.id, worker_id, &failure).await? {
            return Ok(self.discard(job.id).await);
        }

        tracing::error!(
            job_id = %job.id,
            task_type = %job.task_type,
            worker_id,
            "No handler registered for task type, job dead-lettered"
        );
        self.audit.job(job.id, LogLevel::Error, message).await;
        Ok(JobOutcome::HandlerMissing)
    }

    async fn discard(&self, job_id: Uuid) -> JobOutcome {
        tracing::warn!(
            job_id = %job_id,
            worker_id = %self.options.worker_id,
            "Lease lost before outcome was recorded"
        );
        self.audit
            .job_with_meta(
                job_id,
                LogLevel::Warn,
                "outcome discarded; lease no longer held",
                json!({ "workerId": self.options.worker_id }),
            )
            .await;
        JobOutcome::Discarded
    }

    /// Poll until `shutdown` is cancelled. Storage errors are logged and
    /// retried after `error_backoff`.
    pub async fn run(&self, shutdown: CancellationToken) {
        let worker_id = self.options.worker_id.as_str();
        tracing::info!(
            worker_id,
            lease_ms = self.options.lease_duration_ms,
            poll_ms = self.options.poll_interval.as_millis() as u64,
            "Worker started"
        );
        self.audit.worker(worker_id, LogLevel::Info, "Worker started").await;

        while !shutdown.is_cancelled() {
            let pause = match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => self.options.poll_interval,
                Err(e) => {
                    tracing::error!(worker_id, error = %e, "Worker iteration failed");
                    self.options.error_backoff
                }
            };

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        tracing::info!(worker_id, "Worker stopped");
        self.audit.worker(worker_id, LogLevel::Info, "Worker stopped").await;
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::jobs::audit::AuditSink;
    use crate::jobs::clock::ManualClock;
    use crate::jobs::error::{TaskError, TaskResult};
    use crate::jobs::memory::{InMemoryAuditSink, InMemoryJobStore};
    use crate::jobs::registry::TaskHandler;
    use crate::models::{AuditFilter, NewJob};

    struct Echo;

    #[async_trait]
    impl TaskHandler for Echo {
        fn task_type() -> &'static str {
            "echo"
        }

        async fn execute(&self, request: TaskRequest) -> TaskResult<JsonValue> {
            Ok(json!({ "echo": request.payload, "worker": request.worker_id }))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskHandler for AlwaysFails {
        fn task_type() -> &'static str {
            "fails"
        }

        async fn execute(&self, _request: TaskRequest) -> TaskResult<JsonValue> {
            Err(TaskError::failed("kaboom"))
        }
    }

    struct Panics;

    #[async_trait]
    impl TaskHandler for Panics {
        fn task_type() -> &'static str {
            "panics"
        }

        async fn execute(&self, _request: TaskRequest) -> TaskResult<JsonValue> {
            panic!("handler bug")
        }
    }

    struct Harness {
        store: Arc<InMemoryJobStore>,
        sink: Arc<InMemoryAuditSink>,
        clock: Arc<ManualClock>,
        worker: Worker,
    }

    fn harness() -> Harness {
        let store = Arc::new(InMemoryJobStore::new());
        let sink = Arc::new(InMemoryAuditSink::new());
        let clock = Arc::new(ManualClock::new(1_000));
        let mut registry = HandlerRegistry::new();
        registry.register(Echo).register(AlwaysFails).register(Panics);

        let worker = Worker::new(
            WorkerOptions::from_config("w-1", &JobsConfig::default()),
            store.clone(),
            Arc::new(registry),
            AuditLog::new(sink.clone(), clock.clone()),
            clock.clone(),
            RetryPolicy::new(1_000, 60_000, 0),
        );
        Harness {
            store,
            sink,
            clock,
            worker,
        }
    }

    async fn submit(h: &Harness, task_type: &str, payload: &str, max_retries: i32) -> Uuid {
        h.store
            .insert(NewJob::new("1", task_type, payload, max_retries, h.clock.now_ms()))
            .await
            .unwrap()
            .id
    }

    async fn messages(h: &Harness, id: Uuid) -> Vec<String> {
        let filter = AuditFilter {
            owner_id: Some(id.to_string()),
            ..Default::default()
        };
        let mut entries = h.sink.recent(&filter, 100).await.unwrap();
        entries.reverse();
        entries.into_iter().map(|e| e.message).collect()
    }

    #[tokio::test]
    async fn test_idle_when_queue_empty() {
        let h = harness();
        assert!(h.worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_success_records_result_and_clears_lease() {
        let h = harness();
        let id = submit(&h, "echo", r#"{"n":1}"#, 3).await;

        let (processed, outcome) = h.worker.run_once().await.unwrap().unwrap();
        assert_eq!((processed, outcome), (id, JobOutcome::Done));

        let job = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Done);
        assert!(job.lease_worker.is_none() && job.lease_until.is_none());
        let result: JsonValue = serde_json::from_str(job.result.as_deref().unwrap()).unwrap();
        assert_eq!(result, json!({ "echo": { "n": 1 }, "worker": "w-1" }));
        assert_eq!(
            messages(&h, id).await,
            vec![
                format!("Worker w-1 started handler for job {} type echo", id),
                "handler processed successfully".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_payload_passed_raw() {
        let h = harness();
        let id = submit(&h, "echo", "not json", 3).await;
        h.worker.run_once().await.unwrap();

        let job = h.store.get(id).await.unwrap().unwrap();
        let result: JsonValue = serde_json::from_str(job.result.as_deref().unwrap()).unwrap();
        assert_eq!(result["echo"], json!("not json"));
    }

    #[tokio::test]
    async fn test_soft_failure_schedules_retry() {
        let h = harness();
        let id = submit(&h, "fails", "{}", 3).await;

        let (_, outcome) = h.worker.run_once().await.unwrap().unwrap();
        assert_eq!(outcome, JobOutcome::Retrying { next_attempt_after: 2_000 });

        let job = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.retries, 1);
        assert_eq!(job.error.as_deref(), Some("kaboom"));
        assert_eq!(job.finished_at, Some(1_000));
        assert!(messages(&h, id).await.contains(&"handler-error: kaboom".to_string()));
    }

    #[tokio::test]
    async fn test_backoff_blocks_reclaim_until_due() {
        let h = harness();
        submit(&h, "fails", "{}", 3).await;
        h.worker.run_once().await.unwrap();

        assert!(h.worker.run_once().await.unwrap().is_none());
        h.clock.advance(1_000);
        let (_, outcome) = h.worker.run_once().await.unwrap().unwrap();
        // retries=1 -> 2s backoff
        assert_eq!(outcome, JobOutcome::Retrying { next_attempt_after: 4_000 });
    }

    #[tokio::test]
    async fn test_last_attempt_goes_straight_to_dlq() {
        let h = harness();
        let id = submit(&h, "fails", "{}", 1).await;

        let (_, outcome) = h.worker.run_once().await.unwrap().unwrap();
        assert_eq!(outcome, JobOutcome::DeadLettered);

        let job = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dlq);
        assert_eq!(job.retries, 1);
        assert!(job.next_attempt_after.is_none());
        assert!(messages(&h, id).await.contains(&"moved to dlq".to_string()));
    }

    #[tokio::test]
    async fn test_missing_handler_is_hard_fail() {
        let h = harness();
        let id = submit(&h, "resize", "{}", 5).await;

        let (_, outcome) = h.worker.run_once().await.unwrap().unwrap();
        assert_eq!(outcome, JobOutcome::HandlerMissing);

        let job = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, JobStatus::Dlq);
        assert_eq!(job.retries, 1);
        assert_eq!(job.error.as_deref(), Some("handler-missing: resize"));
        assert!(job.lease_worker.is_none());
    }

    #[tokio::test]
    async fn test_panicking_handler_is_soft_failure() {
        let h = harness();
        let id = submit(&h, "panics", "{}", 3).await;

        let (_, outcome) = h.worker.run_once().await.unwrap().unwrap();
        assert!(matches!(outcome, JobOutcome::Retrying { .. }));
        let job = h.store.get(id).await.unwrap().unwrap();
        assert!(job.error.unwrap().starts_with("handler panicked"));
    }

    #[tokio::test]
    async fn test_stale_outcome_is_discarded() {
        let h = harness();
        let id = submit(&h, "echo", "{}", 3).await;
        let now = h.clock.now_ms();
        let job = h
            .store
            .claim(
                id,
                &Lease {
                    worker_id: "w-1".to_string(),
                    now,
                    until: now + 10,
                },
            )
            .await
            .unwrap()
            .unwrap();

        // Coordinator reclaims, another worker takes over.
        h.store.reclaim_expired(now + 10).await.unwrap();
        h.store
            .claim(
                id,
                &Lease {
                    worker_id: "w-2".to_string(),
                    now: now + 10,
                    until: now + 30_010,
                },
            )
            .await
            .unwrap();

        assert_eq!(h.worker.process(job).await.unwrap(), JobOutcome::Discarded);
        let row = h.store.get(id).await.unwrap().unwrap();
        assert_eq!(row.lease_worker.as_deref(), Some("w-2"));
        assert_eq!(row.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_storage_error_surfaces_from_run_once() {
        let h = harness();
        h.store.set_unavailable(true);
        assert!(h.worker.run_once().await.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness();
        let id = submit(&h, "echo", "{}", 3).await;
        let token = CancellationToken::new();
        let worker = Arc::new(h.worker);

        let handle = {
            let worker = worker.clone();
            let token = token.clone();
            tokio::spawn(async move { worker.run(token).await })
        };

        for _ in 0..100 {
            if h.store.get(id).await.unwrap().unwrap().status == JobStatus::Done {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        token.cancel();
        handle.await.unwrap();

        assert_eq!(h.store.get(id).await.unwrap().unwrap().status, JobStatus::Done);
    }
}
