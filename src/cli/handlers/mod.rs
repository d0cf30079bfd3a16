//! Command handlers for CLI operations
//!
//! Each process role has its own handler; parsing and configuration
//! merging happen before any of these run.

pub mod coordinator;
pub mod migrate;
pub mod serve;
pub mod worker;

pub use coordinator::CoordinatorCommandHandler;
pub use migrate::MigrateCommandHandler;
pub use serve::ServeCommandHandler;
pub use worker::WorkerCommandHandler;
