//! Job records and their lifecycle status.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use diesel::deserialize::{self, FromSql};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::serialize::{self, Output, ToSql};
use diesel::sql_types::Text;
use diesel::{AsExpression, FromSqlRow};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::jobs;

// ============================================================================
// Status
// ============================================================================

/// Lifecycle status of a job.
///
/// ```text
/// pending -> running -> done
///                    -> failed -> pending | running | dlq
///                    -> dlq    -> pending (once)
/// running -> pending (lease expired)
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    utoipa::ToSchema,
    AsExpression,
    FromSqlRow,
)]
#[diesel(sql_type = Text)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
    Dlq,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Done,
        JobStatus::Failed,
        JobStatus::Dlq,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Done => "done",
            JobStatus::Failed => "failed",
            JobStatus::Dlq => "dlq",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "done" => Ok(JobStatus::Done),
            "failed" => Ok(JobStatus::Failed),
            "dlq" => Ok(JobStatus::Dlq),
            other => Err(format!("Unrecognized job status: {}", other)),
        }
    }
}

impl diesel::query_builder::QueryId for JobStatus {
    type QueryId = JobStatus;
    const HAS_STATIC_QUERY_ID: bool = false;
}

impl ToSql<Text, Pg> for JobStatus {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(serialize::IsNull::No)
    }
}

impl FromSql<Text, Pg> for JobStatus {
    fn from_sql(
        bytes: <Pg as diesel::backend::Backend>::RawValue<'_>,
    ) -> deserialize::Result<Self> {
        let s = <String as FromSql<Text, Pg>>::from_sql(bytes)?;
        s.parse::<JobStatus>().map_err(Into::into)
    }
}

// ============================================================================
// Job Models
// ============================================================================

/// A persisted job row. Times are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Queryable, Selectable, QueryableByName)]
#[diesel(table_name = jobs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Job {
    pub id: Uuid,
    pub owner_id: String,
    pub task_type: String,
    /// Serialized JSON, passed to the handler as-is
    pub payload: String,
    pub status: JobStatus,
    pub retries: i32,
    pub max_retries: i32,
    pub lease_worker: Option<String>,
    pub lease_until: Option<i64>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub next_attempt_after: Option<i64>,
    pub result: Option<String>,
    pub error: Option<String>,
    pub dlq_redrives: i32,
}

impl Job {
    /// Whether a worker may claim this job at `now`.
    pub fn is_eligible(&self, now: i64) -> bool {
        match self.status {
            JobStatus::Pending => true,
            JobStatus::Failed => {
                self.retries < self.max_retries
                    && self.next_attempt_after.is_none_or(|after| after <= now)
            }
            _ => false,
        }
    }

    pub fn is_leased_by(&self, worker_id: &str) -> bool {
        self.status == JobStatus::Running && self.lease_worker.as_deref() == Some(worker_id)
    }

    pub fn clear_lease(&mut self) {
        self.lease_worker = None;
        self.lease_until = None;
    }
}

/// Insert model; every other column starts at its table default.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = jobs)]
pub struct NewJob {
    pub id: Uuid,
    pub owner_id: String,
    pub task_type: String,
    pub payload: String,
    pub status: JobStatus,
    pub max_retries: i32,
    pub created_at: i64,
}

impl NewJob {
    pub fn new(
        owner_id: impl Into<String>,
        task_type: impl Into<String>,
        payload: impl Into<String>,
        max_retries: i32,
        created_at: i64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            task_type: task_type.into(),
            payload: payload.into(),
            status: JobStatus::Pending,
            max_retries,
            created_at,
        }
    }

    /// The row as it reads back right after insertion.
    pub fn into_job(self) -> Job {
        Job {
            id: self.id,
            owner_id: self.owner_id,
            task_type: self.task_type,
            payload: self.payload,
            status: self.status,
            retries: 0,
            max_retries: self.max_retries,
            lease_worker: None,
            lease_until: None,
            created_at: self.created_at,
            started_at: None,
            finished_at: None,
            next_attempt_after: None,
            result: None,
            error: None,
            dlq_redrives: 0,
        }
    }
}

/// Aggregate counts per bucket; the six buckets partition the table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, QueryableByName)]
pub struct StatusReport {
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub submitted: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub processing: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub done: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub failed: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub dlq_with_redrive: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub dlq_without_redrive: i64,
}

impl StatusReport {
    pub fn total(&self) -> i64 {
        self.submitted
            + self.processing
            + self.done
            + self.failed
            + self.dlq_with_redrive
            + self.dlq_without_redrive
    }

    /// Count one job into its bucket.
    pub fn record(&mut self, job: &Job) {
        match job.status {
            JobStatus::Pending => self.submitted += 1,
            JobStatus::Running => self.processing += 1,
            JobStatus::Done => self.done += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Dlq if job.dlq_redrives > 0 => self.dlq_with_redrive += 1,
            JobStatus::Dlq => self.dlq_without_redrive += 1,
        }
    }
}
