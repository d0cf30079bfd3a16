//! Repository layer for data access operations.
//!
//! PostgreSQL implementations of the engine's storage seams.

mod audit_repo;
mod job_repo;

pub use audit_repo::AuditRepository;
pub use job_repo::JobRepository;

use std::sync::Arc;

use crate::db::AsyncDbPool;
use crate::jobs::{AuditSink, JobStore};

/// Aggregates all repositories for convenient access.
///
/// Since `AsyncDbPool` uses `Arc` internally, cloning is cheap.
#[derive(Clone)]
pub struct Repositories {
    pub jobs: Arc<dyn JobStore>,
    pub audit: Arc<dyn AuditSink>,
}

impl Repositories {
    /// Creates a new Repositories instance backed by PostgreSQL.
    pub fn new(pool: AsyncDbPool) -> Self {
        Self {
            jobs: Arc::new(JobRepository::new(pool.clone())),
            audit: Arc::new(AuditRepository::new(pool)),
        }
    }

    /// Repositories backed by in-process stores.
    pub fn in_memory() -> Self {
        Self {
            jobs: Arc::new(crate::jobs::InMemoryJobStore::new()),
            audit: Arc::new(crate::jobs::InMemoryAuditSink::new()),
        }
    }
}
