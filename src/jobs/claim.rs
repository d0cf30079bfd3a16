//! Two-phase claim: select the oldest eligible id, then take it with a
//! conditional write guarded by the same eligibility predicate.

use uuid::Uuid;

use crate::error::AppResult;
use crate::jobs::store::{JobStore, Lease};
use crate::models::Job;

#[derive(Debug, Clone, PartialEq)]
pub enum ClaimOutcome {
    Claimed(Job),
    /// Another caller changed the selected row first
    Lost(Uuid),
    /// Nothing eligible
    Empty,
}

pub async fn try_claim(store: &dyn JobStore, lease: &Lease) -> AppResult<ClaimOutcome> {
    let Some(id) = store.oldest_eligible(lease.now).await? else {
        return Ok(ClaimOutcome::Empty);
    };

    match store.claim(id, lease).await? {
        Some(job) => Ok(ClaimOutcome::Claimed(job)),
        None => Ok(ClaimOutcome::Lost(id)),
    }
}

/// Retry lost races up to `attempts` times; a loss never means the queue is empty.
pub async fn claim_next(
    store: &dyn JobStore,
    lease: &Lease,
    attempts: u32,
) -> AppResult<Option<Job>> {
    for attempt in 1..=attempts.max(1) {
        match try_claim(store, lease).await? {
            ClaimOutcome::Claimed(job) => return Ok(Some(job)),
            ClaimOutcome::Empty => return Ok(None),
            ClaimOutcome::Lost(id) => {
                tracing::debug!(
                    job_id = %id,
                    worker_id = %lease.worker_id,
                    attempt,
                    "Claim race lost, re-selecting"
                );
            }
        }
    }
    Ok(None)
}
