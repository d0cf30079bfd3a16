//! The job lifecycle engine: store contract, claim protocol, worker loop,
//! retry policy and coordinator sweep.

pub mod audit;
pub mod claim;
pub mod clock;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod store;
pub mod tasks;
pub mod worker;

pub use audit::{AuditLog, AuditSink};
pub use claim::{ClaimOutcome, claim_next, try_claim};
pub use clock::{Clock, ManualClock, SystemClock};
pub use coordinator::{COORDINATOR_ID, Coordinator, CoordinatorOptions, SweepReport};
pub use error::{TaskError, TaskResult};
pub use memory::{InMemoryAuditSink, InMemoryJobStore};
pub use registry::{HandlerRegistry, TaskHandler, TaskRequest};
pub use retry::{FailureDecision, RetryPolicy};
pub use store::{Failure, JobFilter, JobStore, Lease, PageCursor, Redriven};
pub use worker::{JobOutcome, Worker, WorkerOptions, generate_worker_id};
