//! Conditional-write behaviour of the PostgreSQL repositories.
//!
//! Skipped unless `CONVEYOR_TEST_DATABASE_URL` points at a disposable
//! database. Tests only assert on rows they created, so the suite can share
//! one database with earlier runs. The sweep passes act on the whole table;
//! tests that drive them place their rows before anything earlier runs left
//! behind (see [`fresh_epoch`]) and run one at a time.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use conveyor::config::DatabaseConfig;
use conveyor::db::{establish_async_connection_pool, run_pending_migrations};
use conveyor::jobs::{Failure, JobFilter, JobStore, Lease};
use conveyor::models::{Job, JobStatus, NewJob};
use conveyor::repositories::JobRepository;

const NOW: i64 = 1_700_000_000_000;

static SERIAL: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    SERIAL.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A timestamp older than every row a previous run could have written, so
/// oldest-first passes reach this test's rows before any leftovers. Lease
/// and backoff times derived from it are likewise below every leftover.
fn fresh_epoch() -> i64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    -i64::try_from(nanos).unwrap()
}

async fn repository() -> Option<JobRepository> {
    let url = std::env::var("CONVEYOR_TEST_DATABASE_URL").ok()?;
    run_pending_migrations(&url).await.unwrap();

    let config = DatabaseConfig {
        url,
        max_connections: 20,
        ..Default::default()
    };
    let pool = establish_async_connection_pool(&config).await.unwrap();
    Some(JobRepository::new(pool))
}

fn lease(worker: &str) -> Lease {
    Lease {
        worker_id: worker.to_string(),
        now: NOW,
        until: NOW + 30_000,
    }
}

async fn insert(repo: &JobRepository, max_retries: i32, created_at: i64) -> Job {
    repo.insert(NewJob::new("pg", "transform", "{}", max_retries, created_at))
        .await
        .unwrap()
}

/// Claim `id` for `worker` at `now` with a lease running until `until`.
async fn claim_until(repo: &JobRepository, id: Uuid, worker: &str, now: i64, until: i64) {
    let lease = Lease {
        worker_id: worker.to_string(),
        now,
        until,
    };
    assert!(repo.claim(id, &lease).await.unwrap().is_some());
}

/// Claim `id` and record a failed attempt ending in `status`.
async fn run_and_fail(
    repo: &JobRepository,
    id: Uuid,
    now: i64,
    status: JobStatus,
    next_attempt_after: Option<i64>,
) {
    claim_until(repo, id, "w-fail", now, now + 30_000).await;
    let failure = Failure {
        status,
        error: "boom".to_string(),
        finished_at: now,
        next_attempt_after,
    };
    assert!(repo.mark_failed(id, "w-fail", &failure).await.unwrap());
}

async fn stored(repo: &JobRepository, id: Uuid) -> Job {
    repo.get(id).await.unwrap().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_claims_single_winner() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let repo = Arc::new(repo);
    let job = repo
        .insert(NewJob::new(Uuid::new_v4().to_string(), "transform", "{}", 3, NOW))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..10 {
        let repo = repo.clone();
        let id = job.id;
        handles.push(tokio::spawn(async move {
            repo.claim(id, &lease(&format!("w-{n}"))).await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);

    let stored = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Running);
    assert_eq!(stored.lease_until, Some(NOW + 30_000));
}

#[tokio::test]
async fn test_outcome_writes_require_the_lease() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let job = repo
        .insert(NewJob::new(Uuid::new_v4().to_string(), "failureTest", "{}", 2, NOW))
        .await
        .unwrap();
    repo.claim(job.id, &lease("w-1")).await.unwrap().unwrap();

    assert!(!repo.mark_done(job.id, "w-2", "{}", NOW + 1).await.unwrap());
    assert!(repo.mark_processing(job.id, "w-1", NOW + 1).await.unwrap());

    let failure = Failure {
        status: JobStatus::Failed,
        error: "boom".to_string(),
        finished_at: NOW + 2,
        next_attempt_after: Some(NOW + 1_002),
    };
    assert!(repo.mark_failed(job.id, "w-1", &failure).await.unwrap());
    // A second write from the same worker finds the lease already released
    assert!(!repo.mark_failed(job.id, "w-1", &failure).await.unwrap());

    let stored = repo.get(job.id).await.unwrap().unwrap();
    assert_eq!(stored.status, JobStatus::Failed);
    assert_eq!(stored.retries, 1);
    assert_eq!(stored.error.as_deref(), Some("boom"));
    assert!(stored.lease_worker.is_none() && stored.lease_until.is_none());

    // Backoff not elapsed: not claimable yet
    assert!(repo.claim(job.id, &lease("w-1")).await.unwrap().is_none());
}

#[tokio::test]
async fn test_owner_listing_is_newest_first() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let owner = Uuid::new_v4().to_string();
    let mut ids = Vec::new();
    for offset in 0..3 {
        let job = repo
            .insert(NewJob::new(owner.clone(), "sleep", "{}", 1, NOW + offset))
            .await
            .unwrap();
        ids.push(job.id);
    }

    let filter = JobFilter {
        owner_id: Some(owner),
        ..Default::default()
    };
    let listed: Vec<Uuid> = repo
        .list(&filter, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    ids.reverse();
    assert_eq!(listed, ids);
}

#[tokio::test]
async fn test_selection_is_fifo_and_honours_backoff_and_ceiling() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let epoch = fresh_epoch();
    let exhausted = insert(&repo, 1, epoch).await;
    let backing_off = insert(&repo, 3, epoch + 1).await;
    let waiting = insert(&repo, 3, epoch + 2).await;

    assert_eq!(repo.oldest_eligible(epoch + 10).await.unwrap(), Some(exhausted.id));

    // Failed with no backoff, but out of retries: never selected again
    run_and_fail(&repo, exhausted.id, epoch + 10, JobStatus::Failed, None).await;
    assert_eq!(repo.oldest_eligible(epoch + 10).await.unwrap(), Some(backing_off.id));

    run_and_fail(&repo, backing_off.id, epoch + 20, JobStatus::Failed, Some(epoch + 500)).await;
    assert_eq!(repo.oldest_eligible(epoch + 499).await.unwrap(), Some(waiting.id));
    assert_eq!(repo.oldest_eligible(epoch + 500).await.unwrap(), Some(backing_off.id));

    // The claim re-checks the same predicate
    let early = Lease {
        worker_id: "w-early".to_string(),
        now: epoch + 499,
        until: epoch + 30_499,
    };
    assert!(repo.claim(backing_off.id, &early).await.unwrap().is_none());
    assert!(repo.claim(exhausted.id, &early).await.unwrap().is_none());
}

#[tokio::test]
async fn test_sweep_passes_touch_only_matching_rows() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let epoch = fresh_epoch();

    let live = insert(&repo, 3, epoch).await;
    claim_until(&repo, live.id, "w-live", epoch, epoch + 1_000).await;
    let expired = insert(&repo, 3, epoch + 1).await;
    claim_until(&repo, expired.id, "w-dead", epoch, epoch + 100).await;

    let reclaimed = repo.reclaim_expired(epoch + 100).await.unwrap();
    assert!(reclaimed.contains(&expired.id));
    assert!(!reclaimed.contains(&live.id));
    let row = stored(&repo, expired.id).await;
    assert_eq!(row.status, JobStatus::Pending);
    assert!(row.lease_worker.is_none() && row.lease_until.is_none());
    assert_eq!(stored(&repo, live.id).await.status, JobStatus::Running);
    assert!(!repo.reclaim_expired(epoch + 100).await.unwrap().contains(&expired.id));

    let exhausted = insert(&repo, 1, epoch + 2).await;
    run_and_fail(&repo, exhausted.id, epoch, JobStatus::Failed, None).await;
    let exhausted_due = insert(&repo, 1, epoch + 3).await;
    run_and_fail(&repo, exhausted_due.id, epoch, JobStatus::Failed, Some(epoch + 200)).await;
    let due = insert(&repo, 3, epoch + 4).await;
    run_and_fail(&repo, due.id, epoch, JobStatus::Failed, Some(epoch + 200)).await;
    let later = insert(&repo, 3, epoch + 5).await;
    run_and_fail(&repo, later.id, epoch, JobStatus::Failed, Some(epoch + 900)).await;

    // Re-activation never resurrects an exhausted job, even when it runs first
    let reactivated = repo.reactivate_due(epoch + 200).await.unwrap();
    assert!(reactivated.contains(&due.id));
    for id in [later.id, exhausted.id, exhausted_due.id] {
        assert!(!reactivated.contains(&id));
    }
    let row = stored(&repo, due.id).await;
    assert_eq!((row.status, row.retries), (JobStatus::Pending, 1));

    let promoted = repo.promote_exhausted(epoch + 200).await.unwrap();
    assert!(promoted.contains(&exhausted.id));
    assert!(promoted.contains(&exhausted_due.id));
    assert!(!promoted.contains(&later.id));
    let row = stored(&repo, exhausted_due.id).await;
    assert_eq!((row.status, row.retries), (JobStatus::Dlq, 1));
    assert!(row.next_attempt_after.is_none());
    assert_eq!(stored(&repo, later.id).await.status, JobStatus::Failed);
}

#[tokio::test]
async fn test_redrive_is_oldest_first_batched_and_once() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let epoch = fresh_epoch();
    let mut dead = Vec::new();
    for offset in 0..3 {
        let job = insert(&repo, 1, epoch + offset).await;
        run_and_fail(&repo, job.id, epoch + 10, JobStatus::Dlq, None).await;
        dead.push(job.id);
    }

    let first = repo.redrive_dead_letters(2).await.unwrap();
    let first_ids: HashSet<Uuid> = first.iter().map(|r| r.id).collect();
    assert_eq!(first_ids, HashSet::from([dead[0], dead[1]]));
    assert!(first.iter().all(|r| r.dlq_redrives == 1));

    let row = stored(&repo, dead[0]).await;
    assert_eq!(row.status, JobStatus::Pending);
    assert_eq!((row.retries, row.dlq_redrives), (0, 1));
    assert!(row.error.is_none() && row.finished_at.is_none() && row.next_attempt_after.is_none());

    let second: Vec<Uuid> = repo
        .redrive_dead_letters(2)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    assert!(second.contains(&dead[2]));
    assert!(!second.contains(&dead[0]) && !second.contains(&dead[1]));

    // A redriven job that dead-letters again stays there
    run_and_fail(&repo, dead[0], epoch + 20, JobStatus::Dlq, None).await;
    for _ in 0..2 {
        let redriven: Vec<Uuid> = repo
            .redrive_dead_letters(100)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert!(!redriven.contains(&dead[0]));
        assert!(!repo.reactivate_due(epoch + 1_000).await.unwrap().contains(&dead[0]));
    }
    let row = stored(&repo, dead[0]).await;
    assert_eq!(row.status, JobStatus::Dlq);
    assert_eq!((row.retries, row.dlq_redrives), (1, 1));
}

#[tokio::test]
async fn test_report_counts_partition_the_table() {
    let _serial = serial();
    let Some(repo) = repository().await else {
        return;
    };
    let before = repo.status_report().await.unwrap();
    let epoch = fresh_epoch();

    // Oldest first, so the single-row redrive below picks it
    let redriven = insert(&repo, 1, epoch).await;
    run_and_fail(&repo, redriven.id, epoch + 10, JobStatus::Dlq, None).await;
    let batch = repo.redrive_dead_letters(1).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].id, redriven.id);
    run_and_fail(&repo, redriven.id, epoch + 20, JobStatus::Dlq, None).await;

    insert(&repo, 3, epoch + 1).await;
    let running = insert(&repo, 3, epoch + 2).await;
    claim_until(&repo, running.id, "w-busy", epoch, epoch + 30_000).await;
    let done = insert(&repo, 3, epoch + 3).await;
    claim_until(&repo, done.id, "w-ok", epoch, epoch + 30_000).await;
    assert!(repo.mark_done(done.id, "w-ok", "{}", epoch + 5).await.unwrap());
    let failed = insert(&repo, 3, epoch + 4).await;
    run_and_fail(&repo, failed.id, epoch, JobStatus::Failed, Some(epoch + 1_000)).await;
    let dead = insert(&repo, 1, epoch + 5).await;
    run_and_fail(&repo, dead.id, epoch, JobStatus::Dlq, None).await;

    let after = repo.status_report().await.unwrap();
    assert_eq!(after.submitted - before.submitted, 1);
    assert_eq!(after.processing - before.processing, 1);
    assert_eq!(after.done - before.done, 1);
    assert_eq!(after.failed - before.failed, 1);
    assert_eq!(after.dlq_with_redrive - before.dlq_with_redrive, 1);
    assert_eq!(after.dlq_without_redrive - before.dlq_without_redrive, 1);

    let rows = repo.list(&JobFilter::default(), i64::MAX).await.unwrap();
    assert_eq!(after.total(), rows.len() as i64);
}
