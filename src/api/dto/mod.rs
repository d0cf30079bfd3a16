//! Data Transfer Objects for API requests and responses.
//!
//! DTOs are organized by domain:
//! - `job` - submission and listing
//! - `log` - audit trail listing
//! - `report` - dashboard counts
//! - `health` - health probes
//! - `error` - common error response

mod error;
mod health;
mod job;
mod log;
mod report;

pub use error::ErrorResponse;
pub use health::{ComponentHealth, HealthResponse, HealthStatus};
pub use job::{
    CreateJobRequest, CreateJobResponse, DataResponse, JobListQuery, JobListResponse, JobResponse,
};
pub use log::{LogListQuery, LogListResponse, LogResponse};
pub use report::ReportResponse;
