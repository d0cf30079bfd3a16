//! PostgreSQL implementation of [`JobStore`].
//!
//! CRUD and listing go through the diesel DSL. State transitions are raw
//! conditional updates: each `WHERE` re-states the expected state, and under
//! READ COMMITTED PostgreSQL re-evaluates it against the latest row version
//! after waiting on a concurrent writer, so a lost race affects zero rows.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel_async::RunQueryDsl;
use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::bb8::PooledConnection;
use uuid::Uuid;

use crate::db::AsyncDbPool;
use crate::error::{AppError, AppResult, DatabaseErrorConverter};
use crate::jobs::store::{Failure, JobFilter, JobStore, Lease, Redriven};
use crate::models::{Job, JobStatus, NewJob, StatusReport};
use crate::schema::jobs;

/// Claim eligibility at `$1 = now`.
macro_rules! eligible {
    () => {
        "(status = 'pending' OR (status = 'failed' AND retries < max_retries \
         AND (next_attempt_after IS NULL OR next_attempt_after <= $1)))"
    };
}

const SELECT_ELIGIBLE: &str = concat!(
    "SELECT id FROM jobs WHERE ",
    eligible!(),
    " ORDER BY created_at ASC, id ASC LIMIT 1"
);

const CLAIM: &str = concat!(
    "UPDATE jobs SET status = 'running', lease_worker = $2, lease_until = $3, started_at = $1 \
     WHERE id = $4 AND ",
    eligible!(),
    " RETURNING *"
);

const MARK_PROCESSING: &str = "UPDATE jobs SET started_at = $1 \
     WHERE id = $2 AND status = 'running' AND lease_worker = $3";

const MARK_DONE: &str = "UPDATE jobs SET status = 'done', result = $1, error = NULL, \
     finished_at = $2, lease_worker = NULL, lease_until = NULL \
     WHERE id = $3 AND status = 'running' AND lease_worker = $4";

const MARK_FAILED: &str = "UPDATE jobs SET status = $1, retries = retries + 1, error = $2, \
     finished_at = $3, next_attempt_after = $4, lease_worker = NULL, lease_until = NULL \
     WHERE id = $5 AND status = 'running' AND lease_worker = $6";

const RECLAIM_EXPIRED: &str = "UPDATE jobs SET status = 'pending', lease_worker = NULL, \
     lease_until = NULL WHERE status = 'running' AND lease_until <= $1 RETURNING id";

const PROMOTE_EXHAUSTED: &str = "UPDATE jobs SET status = 'dlq', next_attempt_after = NULL \
     WHERE status = 'failed' AND retries >= max_retries RETURNING id";

const REACTIVATE_DUE: &str = "UPDATE jobs SET status = 'pending' \
     WHERE status = 'failed' AND retries < max_retries \
     AND next_attempt_after IS NOT NULL AND next_attempt_after <= $1 RETURNING id";

const REDRIVE_DEAD_LETTERS: &str = "UPDATE jobs SET status = 'pending', retries = 0, \
     error = NULL, finished_at = NULL, next_attempt_after = NULL, \
     dlq_redrives = dlq_redrives + 1 \
     WHERE id IN (SELECT id FROM jobs WHERE status = 'dlq' AND dlq_redrives < 1 \
                  ORDER BY created_at ASC, id ASC LIMIT $1 FOR UPDATE SKIP LOCKED) \
     AND status = 'dlq' AND dlq_redrives < 1 \
     RETURNING id, dlq_redrives";

const STATUS_REPORT: &str = "SELECT \
     COUNT(*) FILTER (WHERE status = 'pending') AS submitted, \
     COUNT(*) FILTER (WHERE status = 'running') AS processing, \
     COUNT(*) FILTER (WHERE status = 'done') AS done, \
     COUNT(*) FILTER (WHERE status = 'failed') AS failed, \
     COUNT(*) FILTER (WHERE status = 'dlq' AND dlq_redrives > 0) AS dlq_with_redrive, \
     COUNT(*) FILTER (WHERE status = 'dlq' AND dlq_redrives = 0) AS dlq_without_redrive \
     FROM jobs";

#[derive(QueryableByName)]
struct IdRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
}

#[derive(QueryableByName)]
struct RedriveRow {
    #[diesel(sql_type = diesel::sql_types::Uuid)]
    id: Uuid,
    #[diesel(sql_type = Integer)]
    dlq_redrives: i32,
}

fn db_error(operation: &'static str) -> impl FnOnce(diesel::result::Error) -> AppError {
    move |e| DatabaseErrorConverter::convert_diesel_error(e, operation)
}

#[derive(Clone)]
pub struct JobRepository {
    pool: AsyncDbPool,
}

impl JobRepository {
    pub fn new(pool: AsyncDbPool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> AppResult<PooledConnection<'_, AsyncPgConnection>> {
        self.pool.get().await.map_err(|e| AppError::ConnectionPool {
            source: anyhow::Error::from(e),
        })
    }

    async fn ids(&self, sql: &'static str, now: Option<i64>, operation: &'static str) -> AppResult<Vec<Uuid>> {
        let mut conn = self.conn().await?;
        let rows: Vec<IdRow> = match now {
            Some(now) => {
                diesel::sql_query(sql)
                    .bind::<BigInt, _>(now)
                    .load(&mut conn)
                    .await
            }
            None => diesel::sql_query(sql).load(&mut conn).await,
        }
        .map_err(db_error(operation))?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }
}

#[async_trait]
impl JobStore for JobRepository {
    async fn insert(&self, job: NewJob) -> AppResult<Job> {
        let mut conn = self.conn().await?;

        diesel::insert_into(jobs::table)
            .values(&job)
            .returning(Job::as_returning())
            .get_result(&mut conn)
            .await
            .map_err(db_error("insert job"))
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Job>> {
        let mut conn = self.conn().await?;

        jobs::table
            .find(id)
            .select(Job::as_select())
            .first(&mut conn)
            .await
            .optional()
            .map_err(db_error("get job"))
    }

    async fn list(&self, filter: &JobFilter, limit: i64) -> AppResult<Vec<Job>> {
        let mut conn = self.conn().await?;

        let mut query = jobs::table.select(Job::as_select()).into_boxed();

        if let Some(owner) = &filter.owner_id {
            query = query.filter(jobs::owner_id.eq(owner.clone()));
        }
        if let Some(status) = filter.status {
            query = query.filter(jobs::status.eq(status));
        }
        if let Some(id) = filter.job_id {
            query = query.filter(jobs::id.eq(id));
        }
        if let Some(cursor) = filter.before {
            query = match cursor.id {
                Some(cursor_id) => query.filter(
                    jobs::created_at.lt(cursor.created_at).or(jobs::created_at
                        .eq(cursor.created_at)
                        .and(jobs::id.le(cursor_id))),
                ),
                None => query.filter(jobs::created_at.le(cursor.created_at)),
            };
        }

        query
            .order((jobs::created_at.desc(), jobs::id.desc()))
            .limit(limit)
            .load(&mut conn)
            .await
            .map_err(db_error("list jobs"))
    }

    async fn status_report(&self) -> AppResult<StatusReport> {
        let mut conn = self.conn().await?;

        diesel::sql_query(STATUS_REPORT)
            .get_result::<StatusReport>(&mut conn)
            .await
            .map_err(db_error("status report"))
    }

    async fn oldest_eligible(&self, now: i64) -> AppResult<Option<Uuid>> {
        let mut conn = self.conn().await?;

        let row: Option<IdRow> = diesel::sql_query(SELECT_ELIGIBLE)
            .bind::<BigInt, _>(now)
            .get_result(&mut conn)
            .await
            .optional()
            .map_err(db_error("select eligible job"))?;
        Ok(row.map(|r| r.id))
    }

    async fn claim(&self, id: Uuid, lease: &Lease) -> AppResult<Option<Job>> {
        let mut conn = self.conn().await?;

        diesel::sql_query(CLAIM)
            .bind::<BigInt, _>(lease.now)
            .bind::<Text, _>(lease.worker_id.clone())
            .bind::<BigInt, _>(lease.until)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .get_result::<Job>(&mut conn)
            .await
            .optional()
            .map_err(db_error("claim job"))
    }

    async fn mark_processing(&self, id: Uuid, worker_id: &str, now: i64) -> AppResult<bool> {
        let mut conn = self.conn().await?;

        let updated = diesel::sql_query(MARK_PROCESSING)
            .bind::<BigInt, _>(now)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Text, _>(worker_id.to_string())
            .execute(&mut conn)
            .await
            .map_err(db_error("mark job processing"))?;
        Ok(updated == 1)
    }

    async fn mark_done(
        &self,
        id: Uuid,
        worker_id: &str,
        result: &str,
        finished_at: i64,
    ) -> AppResult<bool> {
        let mut conn = self.conn().await?;

        let updated = diesel::sql_query(MARK_DONE)
            .bind::<Text, _>(result.to_string())
            .bind::<BigInt, _>(finished_at)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Text, _>(worker_id.to_string())
            .execute(&mut conn)
            .await
            .map_err(db_error("mark job done"))?;
        Ok(updated == 1)
    }

    async fn mark_failed(&self, id: Uuid, worker_id: &str, failure: &Failure) -> AppResult<bool> {
        debug_assert!(matches!(failure.status, JobStatus::Failed | JobStatus::Dlq));
        let mut conn = self.conn().await?;

        let updated = diesel::sql_query(MARK_FAILED)
            .bind::<Text, _>(failure.status)
            .bind::<Text, _>(failure.error.clone())
            .bind::<BigInt, _>(failure.finished_at)
            .bind::<Nullable<BigInt>, _>(failure.next_attempt_after)
            .bind::<diesel::sql_types::Uuid, _>(id)
            .bind::<Text, _>(worker_id.to_string())
            .execute(&mut conn)
            .await
            .map_err(db_error("mark job failed"))?;
        Ok(updated == 1)
    }

    async fn reclaim_expired(&self, now: i64) -> AppResult<Vec<Uuid>> {
        self.ids(RECLAIM_EXPIRED, Some(now), "reclaim expired leases")
            .await
    }

    async fn promote_exhausted(&self, _now: i64) -> AppResult<Vec<Uuid>> {
        self.ids(PROMOTE_EXHAUSTED, None, "promote exhausted jobs")
            .await
    }

    async fn reactivate_due(&self, now: i64) -> AppResult<Vec<Uuid>> {
        self.ids(REACTIVATE_DUE, Some(now), "reactivate due retries")
            .await
    }

    async fn redrive_dead_letters(&self, batch: i64) -> AppResult<Vec<Redriven>> {
        let mut conn = self.conn().await?;

        let rows: Vec<RedriveRow> = diesel::sql_query(REDRIVE_DEAD_LETTERS)
            .bind::<BigInt, _>(batch)
            .load(&mut conn)
            .await
            .map_err(db_error("redrive dead letters"))?;
        Ok(rows
            .into_iter()
            .map(|r| Redriven {
                id: r.id,
                dlq_redrives: r.dlq_redrives,
            })
            .collect())
    }

    async fn ping(&self) -> AppResult<()> {
        let mut conn = self.conn().await?;

        diesel::sql_query("SELECT 1")
            .execute(&mut conn)
            .await
            .map_err(db_error("ping"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_and_select_share_predicate() {
        assert!(SELECT_ELIGIBLE.contains(eligible!()));
        assert!(CLAIM.contains(eligible!()));
        assert!(CLAIM.contains("WHERE id = $4 AND (status = 'pending'"));
    }

    #[test]
    fn test_outcome_writes_are_lease_guarded() {
        for sql in [MARK_PROCESSING, MARK_DONE, MARK_FAILED] {
            assert!(sql.contains("status = 'running' AND lease_worker = $"));
        }
    }
}
