//! In-process implementations of [`JobStore`] and [`AuditSink`].
//!
//! A single mutex serializes every operation, which gives each transition
//! the same compare-and-swap semantics as the conditional SQL updates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::jobs::audit::AuditSink;
use crate::jobs::store::{Failure, JobFilter, JobStore, Lease, Redriven};
use crate::models::{
    AuditEntry, AuditFilter, Job, JobStatus, NewAuditEntry, NewJob, StatusReport,
};

fn poisoned() -> AppError {
    AppError::Internal {
        source: anyhow::anyhow!("in-memory store lock poisoned"),
    }
}

fn unavailable(operation: &str) -> AppError {
    AppError::Database {
        operation: operation.to_string(),
        source: anyhow::anyhow!("store unavailable"),
    }
}

/// Oldest first by `(created_at, id)`.
fn oldest_first(a: &Job, b: &Job) -> std::cmp::Ordering {
    (a.created_at, a.id).cmp(&(b.created_at, b.id))
}

#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<Uuid, Job>>,
    unavailable: AtomicBool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail as if the database were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Overwrite a row directly, bypassing every guard.
    #[cfg(test)]
    pub(crate) fn put(&self, job: Job) -> AppResult<()> {
        self.lock("put")?.insert(job.id, job);
        Ok(())
    }

    fn lock(&self, operation: &str) -> AppResult<MutexGuard<'_, HashMap<Uuid, Job>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(unavailable(operation));
        }
        self.jobs.lock().map_err(|_| poisoned())
    }

    /// Apply `update` to every row matching `predicate`, oldest first, up to `limit`.
    fn transition<P, U>(
        &self,
        operation: &str,
        limit: Option<usize>,
        predicate: P,
        mut update: U,
    ) -> AppResult<Vec<Job>>
    where
        P: Fn(&Job) -> bool,
        U: FnMut(&mut Job),
    {
        let mut jobs = self.lock(operation)?;
        let mut matched: Vec<&mut Job> = jobs.values_mut().filter(|j| predicate(j)).collect();
        matched.sort_by(|a, b| oldest_first(a, b));
        if let Some(limit) = limit {
            matched.truncate(limit);
        }
        Ok(matched
            .into_iter()
            .map(|job| {
                update(job);
                job.clone()
            })
            .collect())
    }

    fn with_leased<F>(&self, operation: &str, id: Uuid, worker_id: &str, f: F) -> AppResult<bool>
    where
        F: FnOnce(&mut Job),
    {
        let mut jobs = self.lock(operation)?;
        match jobs.get_mut(&id) {
            Some(job) if job.is_leased_by(worker_id) => {
                f(job);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn insert(&self, job: NewJob) -> AppResult<Job> {
        let mut jobs = self.lock("insert job")?;
        if jobs.contains_key(&job.id) {
            return Err(AppError::Duplicate {
                entity: "jobs".to_string(),
                field: "id".to_string(),
                value: job.id.to_string(),
            });
        }
        let job = job.into_job();
        jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Job>> {
        Ok(self.lock("get job")?.get(&id).cloned())
    }

    async fn list(&self, filter: &JobFilter, limit: i64) -> AppResult<Vec<Job>> {
        let jobs = self.lock("list jobs")?;
        let mut rows: Vec<Job> = jobs.values().filter(|j| filter.matches(j)).cloned().collect();
        rows.sort_by(|a, b| oldest_first(b, a));
        rows.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(rows)
    }

    async fn status_report(&self) -> AppResult<StatusReport> {
        let jobs = self.lock("status report")?;
        let mut report = StatusReport::default();
        for job in jobs.values() {
            report.record(job);
        }
        Ok(report)
    }

    async fn oldest_eligible(&self, now: i64) -> AppResult<Option<Uuid>> {
        let jobs = self.lock("select eligible job")?;
        Ok(jobs
            .values()
            .filter(|j| j.is_eligible(now))
            .min_by(|a, b| oldest_first(a, b))
            .map(|j| j.id))
    }

    async fn claim(&self, id: Uuid, lease: &Lease) -> AppResult<Option<Job>> {
        let mut jobs = self.lock("claim job")?;
        match jobs.get_mut(&id) {
            Some(job) if job.is_eligible(lease.now) => {
                job.status = JobStatus::Running;
                job.lease_worker = Some(lease.worker_id.clone());
                job.lease_until = Some(lease.until);
                job.started_at = Some(lease.now);
                Ok(Some(job.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn mark_processing(&self, id: Uuid, worker_id: &str, now: i64) -> AppResult<bool> {
        self.with_leased("mark processing", id, worker_id, |job| {
            job.started_at = Some(now);
        })
    }

    async fn mark_done(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &str,
        finished_at: i64,
    ) -> AppResult<bool> {
        self.with_leased("mark done", id, worker_id, |job| {
            job.status = JobStatus::Done;
            job.result = Some(result.to_string());
            job.error = None;
            job.finished_at = Some(finished_at);
            job.clear_lease();
        })
    }

    async fn mark_failed(&self, id: Uuid, worker_id: &str, failure: &Failure) -> AppResult<bool> {
        self.with_leased("mark failed", id, worker_id, |job| {
            job.status = failure.status;
            job.retries += 1;
            job.error = Some(failure.error.clone());
            job.finished_at = Some(failure.finished_at);
            job.next_attempt_after = failure.next_attempt_after;
            job.clear_lease();
        })
    }

    async fn reclaim_expired(&self, now: i64) -> AppResult<Vec<Uuid>> {
        let jobs = self.transition(
            "reclaim expired leases",
            None,
            |j| j.status == JobStatus::Running && j.lease_until.is_some_and(|until| until <= now),
            |j| {
                j.status = JobStatus::Pending;
                j.clear_lease();
            },
        )?;
        Ok(jobs.into_iter().map(|j| j.id).collect())
    }

    async fn promote_exhausted(&self, _now: i64) -> AppResult<Vec<Uuid>> {
        let jobs = self.transition(
            "promote exhausted jobs",
            None,
            |j| j.status == JobStatus::Failed && j.retries >= j.max_retries,
            |j| {
                j.status = JobStatus::Dlq;
                j.next_attempt_after = None;
            },
        )?;
        Ok(jobs.into_iter().map(|j| j.id).collect())
    }

    async fn reactivate_due(&self, now: i64) -> AppResult<Vec<Uuid>> {
        let jobs = self.transition(
            "reactivate due retries",
            None,
            |j| {
                j.status == JobStatus::Failed
                    && j.retries < j.max_retries
                    && j.next_attempt_after.is_some_and(|after| after <= now)
            },
            |j| j.status = JobStatus::Pending,
        )?;
        Ok(jobs.into_iter().map(|j| j.id).collect())
    }

    async fn redrive_dead_letters(&self, batch: i64) -> AppResult<Vec<Redriven>> {
        let limit = usize::try_from(batch.max(0)).unwrap_or(usize::MAX);
        let jobs = self.transition(
            "redrive dead letters",
            Some(limit),
            |j| j.status == JobStatus::Dlq && j.dlq_redrives < 1,
            |j| {
                j.status = JobStatus::Pending;
                j.retries = 0;
                j.error = None;
                j.finished_at = None;
                j.next_attempt_after = None;
                j.dlq_redrives += 1;
            },
        )?;
        Ok(jobs
            .into_iter()
            .map(|j| Redriven {
                id: j.id,
                dlq_redrives: j.dlq_redrives,
            })
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        self.lock("ping").map(|_| ())
    }
}

/// Audit sink kept in a vector; ids count up from 1.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `append` fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every entry in insertion order.
    pub fn entries(&self) -> AppResult<Vec<AuditEntry>> {
        Ok(self.entries.lock().map_err(|_| poisoned())?.clone())
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, entry: NewAuditEntry) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(unavailable("append audit entry"));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.entries.lock().map_err(|_| poisoned())?.push(AuditEntry {
            id,
            owner_type: entry.owner_type,
            owner_id: entry.owner_id,
            level: entry.level,
            message: entry.message,
            meta: entry.meta,
            created_at: entry.created_at,
        });
        Ok(())
    }

    async fn recent(&self, filter: &AuditFilter, limit: i64) -> AppResult<Vec<AuditEntry>> {
        let entries = self.entries.lock().map_err(|_| poisoned())?;
        Ok(entries
            .iter()
            .rev()
            .filter(|e| filter.matches(e))
            .take(usize::try_from(limit.max(0)).unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }
}
