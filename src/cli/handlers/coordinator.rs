//! Coordinator command handler
//!
//! Runs the sweep loop, or a single sweep with `--once` for cron-style
//! deployments.

use std::sync::Arc;

use crate::config::settings::Settings;
use crate::error::AppResult;
use crate::jobs::{AuditLog, Clock, Coordinator, CoordinatorOptions, SweepReport, SystemClock};
use crate::repositories::Repositories;
use crate::server::{connect_database, shutdown_token};

/// Handler for the coordinator command
pub struct CoordinatorCommandHandler {
    config: Settings,
}

impl CoordinatorCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    fn coordinator(&self, repos: Repositories) -> Coordinator {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Coordinator::new(
            CoordinatorOptions::from(&self.config.coordinator),
            repos.jobs,
            AuditLog::new(repos.audit, clock.clone()),
            clock,
        )
    }

    /// # Errors
    /// - Configuration validation errors
    /// - Database connection errors
    /// - Sweep errors when `once` is set
    pub async fn execute(self, once: bool, dry_run: bool) -> AppResult<()> {
        self.config.validate()?;

        if dry_run {
            println!("✓ Configuration is valid");
            println!(
                "✓ Sweep every {} ms, redrive up to {} job(s) per sweep",
                self.config.coordinator.sweep_interval_ms,
                self.config.coordinator.redrive_batch_size
            );
            println!("Dry run completed successfully");
            return Ok(());
        }

        let pool = connect_database(&self.config).await?;
        let coordinator = self.coordinator(Repositories::new(pool));

        if once {
            let report = coordinator.sweep().await?;
            print_report(&report);
            return Ok(());
        }

        coordinator.run(shutdown_token()).await;
        Ok(())
    }
}

fn print_report(report: &SweepReport) {
    println!("Sweep completed:");
    println!("  reclaimed:     {}", report.reclaimed);
    println!("  dead-lettered: {}", report.dead_lettered);
    println!("  reactivated:   {}", report.reactivated);
    println!("  redriven:      {}", report.redriven);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_coordinator_dry_run() {
        let handler = CoordinatorCommandHandler::new(Settings::default());
        assert!(handler.execute(false, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_coordinator_invalid_config() {
        let mut config = Settings::default();
        config.coordinator.sweep_interval_ms = 0;
        let handler = CoordinatorCommandHandler::new(config);
        assert!(handler.execute(true, true).await.is_err());
    }

    #[tokio::test]
    async fn test_coordinator_once_requires_database() {
        let mut config = Settings::default();
        config.database.url = String::new();
        let handler = CoordinatorCommandHandler::new(config);
        assert!(handler.execute(true, false).await.is_err());
    }
}
