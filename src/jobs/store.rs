//! The job store contract.
//!
//! Every state transition is a single conditional write: it re-states the
//! state it expects and reports whether it took effect. Callers never
//! read-then-write across two round trips without that guard.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Job, JobStatus, NewJob, StatusReport};

/// Exclusive, time-bounded execution right requested by a worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub worker_id: String,
    pub now: i64,
    pub until: i64,
}

/// Outcome of a failed attempt. `status` is `Failed` or `Dlq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: JobStatus,
    pub error: String,
    pub finished_at: i64,
    pub next_attempt_after: Option<i64>,
}

/// Position in a newest-first listing: the first row of the next page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageCursor {
    pub created_at: i64,
    /// Tie-breaker among rows sharing `created_at`; `None` takes all of them
    pub id: Option<Uuid>,
}

impl PageCursor {
    pub fn from_job(job: &Job) -> Self {
        Self {
            created_at: job.created_at,
            id: Some(job.id),
        }
    }

    /// Whether a row sorts at or after this cursor in `created_at desc, id desc`.
    pub fn admits(&self, created_at: i64, id: Uuid) -> bool {
        match self.id {
            Some(cursor_id) => {
                created_at < self.created_at || (created_at == self.created_at && id <= cursor_id)
            }
            None => created_at <= self.created_at,
        }
    }
}

impl fmt::Display for PageCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id {
            Some(id) => write!(f, "{}_{}", self.created_at, id),
            None => write!(f, "{}", self.created_at),
        }
    }
}

impl FromStr for PageCursor {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AppError::validation("cursor", "Invalid cursor");
        let (created, id) = match s.split_once('_') {
            Some((created, id)) => (created, Some(id.parse::<Uuid>().map_err(|_| invalid())?)),
            None => (s, None),
        };
        Ok(Self {
            created_at: created.parse::<i64>().map_err(|_| invalid())?,
            id,
        })
    }
}

/// Listing filter. `owner_id` is set for non-elevated callers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobFilter {
    pub owner_id: Option<String>,
    pub status: Option<JobStatus>,
    pub job_id: Option<Uuid>,
    pub before: Option<PageCursor>,
}

impl JobFilter {
    pub fn matches(&self, job: &Job) -> bool {
        self.owner_id.as_ref().is_none_or(|o| &job.owner_id == o)
            && self.status.is_none_or(|s| job.status == s)
            && self.job_id.is_none_or(|id| job.id == id)
            && self
                .before
                .is_none_or(|cursor| cursor.admits(job.created_at, job.id))
    }
}

/// A job moved out of `dlq` by a redrive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Redriven {
    pub id: Uuid,
    pub dlq_redrives: i32,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: NewJob) -> AppResult<Job>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Job>>;

    /// Rows matching `filter`, `created_at desc, id desc`, at most `limit`.
    async fn list(&self, filter: &JobFilter, limit: i64) -> AppResult<Vec<Job>>;

    async fn status_report(&self) -> AppResult<StatusReport>;

    /// Id of the oldest claimable job at `now`.
    async fn oldest_eligible(&self, now: i64) -> AppResult<Option<Uuid>>;

    /// Take the lease on `id` if the row is still claimable. `None` means a
    /// concurrent caller changed the row first.
    async fn claim(&self, id: Uuid, lease: &Lease) -> AppResult<Option<Job>>;

    /// Refresh `started_at` while `worker_id` holds the lease.
    async fn mark_processing(&self, id: Uuid, worker_id: &str, now: i64) -> AppResult<bool>;

    async fn mark_done(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &str,
        finished_at: i64,
    ) -> AppResult<bool>;

    /// Record a failed attempt, incrementing `retries` and releasing the lease.
    async fn mark_failed(&self, id: Uuid, worker_id: &str, failure: &Failure) -> AppResult<bool>;

    /// `running` with `lease_until <= now` back to `pending`.
    async fn reclaim_expired(&self, now: i64) -> AppResult<Vec<Uuid>>;

    /// `failed` with `retries >= max_retries` to `dlq`.
    async fn promote_exhausted(&self, now: i64) -> AppResult<Vec<Uuid>>;

    /// `failed` whose backoff elapsed, with retries left, back to `pending`.
    async fn reactivate_due(&self, now: i64) -> AppResult<Vec<Uuid>>;

    /// Up to `batch` never-redriven `dlq` jobs, oldest first, back to `pending`.
    async fn redrive_dead_letters(&self, batch: i64) -> AppResult<Vec<Redriven>>;

    async fn ping(&self) -> AppResult<()>;
}
