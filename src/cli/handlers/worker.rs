//! Worker command handler
//!
//! Runs a single worker loop against the shared database until a shutdown
//! signal arrives. The handler registry is checked against the configured
//! task types before anything connects.

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::tasks::builtin_registry;
use crate::jobs::{
    AuditLog, Clock, HandlerRegistry, RetryPolicy, SystemClock, Worker, WorkerOptions,
    generate_worker_id,
};
use crate::repositories::Repositories;
use crate::server::{connect_database, shutdown_token};

/// Handler for the worker command
pub struct WorkerCommandHandler {
    config: Settings,
}

impl WorkerCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Build the registry and fail if a configured task type has no handler.
    pub fn registry(&self) -> AppResult<HandlerRegistry> {
        let registry = builtin_registry(&self.config.jobs)?;
        registry.validate(&self.config.jobs.task_types)?;
        Ok(registry)
    }

    /// Run the worker, or only validate when `dry_run` is set.
    ///
    /// # Errors
    /// - Configuration or registry validation errors
    /// - Database connection errors
    pub async fn execute(self, worker_id: Option<String>, dry_run: bool) -> AppResult<()> {
        self.config.validate()?;
        let registry = self.registry()?;
        let worker_id = worker_id.unwrap_or_else(generate_worker_id);

        if dry_run {
            println!("✓ Configuration is valid");
            println!("✓ Worker id: {}", worker_id);
            println!("✓ Handlers registered: {}", registry.task_types().join(", "));
            println!(
                "✓ Lease {} ms, poll every {} ms",
                self.config.jobs.lease_duration_ms, self.config.jobs.poll_interval_ms
            );
            println!("Dry run completed successfully");
            return Ok(());
        }

        let pool = connect_database(&self.config).await?;
        let repos = Repositories::new(pool);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let worker = Worker::new(
            WorkerOptions::from_config(worker_id, &self.config.jobs),
            repos.jobs,
            Arc::new(registry),
            AuditLog::new(repos.audit, clock.clone()),
            clock,
            RetryPolicy::from(&self.config.jobs.retry),
        );

        worker.run(shutdown_token()).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[tokio::test]
    async fn test_worker_dry_run_skips_database() {
        // No database URL configured: dry run must not try to connect
        let handler = WorkerCommandHandler::new(Settings::default());
        assert!(handler.execute(Some("w-1".into()), true).await.is_ok());
    }

    #[tokio::test]
    async fn test_worker_rejects_unhandled_task_type() {
        let mut config = Settings::default();
        config.jobs.task_types.push("resizeImage".into());
        let handler = WorkerCommandHandler::new(config);

        let err = handler.execute(None, true).await.unwrap_err();
        assert!(matches!(err, AppError::Configuration { .. }), "got {err:?}");
    }
}
