//! Job service: submission, owner-scoped queries and the status report.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::config::{JobsConfig, Role};
use crate::error::{AppError, AppResult};
use crate::jobs::{AuditLog, Clock, JobFilter, JobStore, PageCursor};
use crate::models::{Job, JobStatus, LogLevel, NewJob, StatusReport};

/// Validated submission request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubmitJob {
    pub task_type: String,
    pub payload: Option<JsonValue>,
    pub max_retries: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobQuery {
    pub job_id: Option<Uuid>,
    pub cursor: Option<PageCursor>,
    pub status: Option<JobStatus>,
    pub limit: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobPage {
    pub jobs: Vec<Job>,
    pub next_cursor: Option<PageCursor>,
}

/// Job service for handling job-related business logic.
#[derive(Clone)]
pub struct JobService {
    store: Arc<dyn JobStore>,
    audit: AuditLog,
    clock: Arc<dyn Clock>,
    task_types: Arc<HashSet<String>>,
    default_max_retries: i32,
    max_retries_limit: i32,
}

impl JobService {
    pub fn new(
        store: Arc<dyn JobStore>,
        audit: AuditLog,
        clock: Arc<dyn Clock>,
        config: &JobsConfig,
    ) -> Self {
        Self {
            store,
            audit,
            clock,
            task_types: Arc::new(config.task_types.iter().cloned().collect()),
            default_max_retries: config.default_max_retries,
            max_retries_limit: config.max_retries_limit,
        }
    }

    /// Enqueue a job owned by `owner_id`.
    ///
    /// # Errors
    /// `Validation` for an unknown task type or an out-of-range `max_retries`.
    pub async fn submit(&self, owner_id: &str, request: SubmitJob) -> AppResult<Job> {
        if !self.task_types.contains(&request.task_type) {
            return Err(AppError::validation("taskType", "Invalid task type"));
        }

        let max_retries = request.max_retries.unwrap_or(self.default_max_retries);
        if !(0..=self.max_retries_limit).contains(&max_retries) {
            return Err(AppError::validation(
                "maxRetries",
                format!("maxRetries must be between 0 and {}", self.max_retries_limit),
            ));
        }

        let payload = request
            .payload
            .unwrap_or_else(|| JsonValue::Object(Default::default()))
            .to_string();

        let job = self
            .store
            .insert(NewJob::new(
                owner_id,
                request.task_type,
                payload,
                max_retries,
                self.clock.now_ms(),
            ))
            .await?;

        tracing::info!(
            job_id = %job.id,
            owner_id,
            task_type = %job.task_type,
            max_retries,
            "Job submitted"
        );
        self.audit
            .user(
                owner_id,
                LogLevel::Info,
                format!("Job scheduled with id {}", job.id),
            )
            .await;

        Ok(job)
    }

    /// Newest-first page of jobs visible to the caller.
    ///
    /// # Errors
    /// `NotFound` for an unknown `job_id`; `Forbidden` when a non-admin asks
    /// for someone else's job.
    pub async fn query(&self, user_id: &str, role: Role, query: JobQuery) -> AppResult<JobPage> {
        if let Some(id) = query.job_id {
            let job = self
                .store
                .get(id)
                .await?
                .ok_or_else(|| AppError::job_not_found(id))?;

            if job.owner_id != user_id && !role.is_elevated() {
                return Err(AppError::Forbidden {
                    message: "Not authorised to fetch this job".to_string(),
                });
            }

            let jobs = if query.status.is_none_or(|s| s == job.status) {
                vec![job]
            } else {
                Vec::new()
            };
            return Ok(JobPage {
                jobs,
                next_cursor: None,
            });
        }

        let filter = JobFilter {
            owner_id: (!role.is_elevated()).then(|| user_id.to_string()),
            status: query.status,
            job_id: None,
            before: query.cursor,
        };
        let limit = query.limit.max(1);

        let mut jobs = self.store.list(&filter, limit + 1).await?;
        let next_cursor = if jobs.len() as i64 > limit {
            let extra = jobs.split_off(limit as usize);
            extra.first().map(PageCursor::from_job)
        } else {
            None
        };

        Ok(JobPage { jobs, next_cursor })
    }

    pub async fn report(&self) -> AppResult<StatusReport> {
        self.store.status_report().await
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.store.ping().await
    }
}
