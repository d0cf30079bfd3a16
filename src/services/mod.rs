//! Service layer for business logic operations.
//!
//! Services encapsulate business logic and coordinate between
//! repositories and handlers.

mod job_service;
mod log_service;

pub use job_service::{JobPage, JobQuery, JobService, SubmitJob};
pub use log_service::{LogPage, LogService};

use std::sync::Arc;

use crate::config::JobsConfig;
use crate::jobs::{AuditLog, Clock};
use crate::repositories::Repositories;

/// Aggregates all services for convenient access.
///
/// This struct is designed to be used as Axum application state.
/// Cloning is cheap since everything inside is reference counted.
#[derive(Clone)]
pub struct Services {
    pub jobs: JobService,
    pub logs: LogService,
    pub audit: AuditLog,
}

impl Services {
    /// Creates a new Services instance from Repositories.
    pub fn new(repos: Repositories, clock: Arc<dyn Clock>, config: &JobsConfig) -> Self {
        let audit = AuditLog::new(repos.audit.clone(), clock.clone());
        Self {
            jobs: JobService::new(repos.jobs, audit.clone(), clock, config),
            logs: LogService::new(repos.audit),
            audit,
        }
    }
}
