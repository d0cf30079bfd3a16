//! Job-related DTOs for API requests and responses.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::jobs::PageCursor;
use crate::jobs::clock::iso8601;
use crate::models::{Job, JobStatus};
use crate::services::{JobPage, JobQuery, SubmitJob};

// ============================================================================
// Request DTOs
// ============================================================================

/// Request body for submitting a job.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "taskType": "sendEmail",
    "payload": { "to": "ops@example.com", "subject": "hello" },
    "maxRetries": 3
}))]
pub struct CreateJobRequest {
    #[validate(length(min = 1, max = 100, message = "Invalid task type"))]
    #[schema(example = "sendEmail")]
    pub task_type: String,

    /// Arbitrary JSON handed to the handler; defaults to `{}`
    #[schema(value_type = Option<Object>)]
    pub payload: Option<JsonValue>,

    #[validate(range(min = 0, message = "maxRetries cannot be negative"))]
    #[schema(example = 3)]
    pub max_retries: Option<i32>,
}

impl From<CreateJobRequest> for SubmitJob {
    fn from(req: CreateJobRequest) -> Self {
        SubmitJob {
            task_type: req.task_type,
            payload: req.payload,
            max_retries: req.max_retries,
        }
    }
}

/// Query parameters for job listings.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct JobListQuery {
    /// Fetch a single job
    pub job_id: Option<Uuid>,

    /// Opaque cursor from a previous page's `nextCursor`
    pub cursor: Option<String>,

    pub status: Option<JobStatus>,

    #[serde(default = "default_job_limit")]
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    #[param(minimum = 1, maximum = 100, example = 20)]
    pub limit: i64,
}

fn default_job_limit() -> i64 {
    20
}

impl JobListQuery {
    pub fn into_query(self) -> AppResult<JobQuery> {
        let cursor = self
            .cursor
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(str::parse::<PageCursor>)
            .transpose()?;

        Ok(JobQuery {
            job_id: self.job_id,
            cursor,
            status: self.status,
            limit: self.limit,
        })
    }
}

// ============================================================================
// Response DTOs
// ============================================================================

/// `{ "data": ... }` envelope used by every job and log endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct DataResponse<T> {
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobResponse {
    pub job_id: Uuid,
    pub status: JobStatus,
}

impl From<&Job> for CreateJobResponse {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
        }
    }
}

/// A job as rendered to clients.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub id: Uuid,
    pub owner_id: String,
    #[schema(example = "sendEmail")]
    pub task_type: String,
    /// Parsed back to JSON when possible, the raw string otherwise
    #[schema(value_type = Object)]
    pub payload: JsonValue,
    pub status: JobStatus,
    pub retries: i32,
    pub max_retries: i32,
    pub lease_worker: Option<String>,
    pub lease_until: Option<i64>,
    pub created_at: i64,
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at_iso: Option<String>,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub next_attempt_after: Option<i64>,
    #[schema(value_type = Option<Object>)]
    pub result: Option<JsonValue>,
    pub error: Option<String>,
    pub dlq_redrives: i32,
}

fn parse_stored(raw: &str) -> JsonValue {
    serde_json::from_str(raw).unwrap_or_else(|_| JsonValue::String(raw.to_string()))
}

impl From<Job> for JobResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            created_at_iso: iso8601(job.created_at),
            payload: parse_stored(&job.payload),
            result: job.result.as_deref().map(parse_stored),
            owner_id: job.owner_id,
            task_type: job.task_type,
            status: job.status,
            retries: job.retries,
            max_retries: job.max_retries,
            lease_worker: job.lease_worker,
            lease_until: job.lease_until,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
            next_attempt_after: job.next_attempt_after,
            error: job.error,
            dlq_redrives: job.dlq_redrives,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JobListResponse {
    pub jobs: Vec<JobResponse>,
    /// Pass back as `cursor` to fetch the next page
    #[schema(example = "1718000000000_0b0f9a36-0d0e-4c4e-9a8e-6f1d2f4a9b11")]
    pub next_cursor: Option<String>,
}

impl From<JobPage> for JobListResponse {
    fn from(page: JobPage) -> Self {
        Self {
            jobs: page.jobs.into_iter().map(JobResponse::from).collect(),
            next_cursor: page.next_cursor.map(|c| c.to_string()),
        }
    }
}
