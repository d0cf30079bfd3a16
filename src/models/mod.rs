//! Persisted data models.

mod audit;
mod job;

pub use audit::{AuditEntry, AuditFilter, LogLevel, NewAuditEntry, OwnerType};
pub use job::{Job, JobStatus, NewJob, StatusReport};
