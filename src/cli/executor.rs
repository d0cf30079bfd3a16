//! Command executor for dispatching CLI commands
//!
//! Entry point for running a parsed command once configuration is loaded.

use super::handlers::{
    CoordinatorCommandHandler, MigrateCommandHandler, ServeCommandHandler, WorkerCommandHandler,
};
use super::parser::{Cli, Commands};
use crate::config::settings::Settings;
use crate::error::AppResult;

/// Execute a CLI command with the given settings.
///
/// No subcommand means `serve`.
///
/// # Errors
/// Returns errors from command handlers or validation failures
pub async fn execute_command(cli: &Cli, settings: Settings) -> AppResult<()> {
    validate_command_args(cli, &settings);

    match cli.command.clone() {
        Some(Commands::Serve { dry_run, .. }) => {
            ServeCommandHandler::new(settings).execute(dry_run).await
        }
        None => ServeCommandHandler::new(settings).execute(false).await,
        Some(Commands::Worker {
            worker_id, dry_run, ..
        }) => {
            WorkerCommandHandler::new(settings)
                .execute(worker_id, dry_run)
                .await
        }
        Some(Commands::Coordinator { once, dry_run, .. }) => {
            CoordinatorCommandHandler::new(settings)
                .execute(once, dry_run)
                .await
        }
        Some(Commands::Migrate { dry_run, rollback }) => {
            MigrateCommandHandler::new(settings)
                .execute(dry_run, rollback)
                .await
        }
    }
}

/// Warn about settings that are legal but probably unintended.
fn validate_command_args(cli: &Cli, settings: &Settings) {
    match &cli.command {
        Some(Commands::Serve { .. }) | None => {
            if settings.auth.tokens.is_empty() {
                tracing::warn!("No API tokens configured; every /v1 request will be rejected");
            }
            if settings.server.port < 1024 && settings.server.host == "0.0.0.0" {
                tracing::warn!(
                    port = settings.server.port,
                    "Binding to 0.0.0.0 on a privileged port requires root privileges"
                );
            }
        }
        Some(Commands::Worker { .. }) => {
            // A lease shorter than the poll interval lets the coordinator
            // reclaim jobs that workers are still holding between polls.
            if settings.jobs.lease_duration_ms <= settings.jobs.poll_interval_ms {
                tracing::warn!(
                    lease_ms = settings.jobs.lease_duration_ms,
                    poll_ms = settings.jobs.poll_interval_ms,
                    "Lease duration does not exceed the poll interval"
                );
            }
        }
        Some(Commands::Coordinator { .. }) => {}
        Some(Commands::Migrate { rollback, .. }) => {
            if let Some(steps) = rollback
                && *steps > 50
            {
                tracing::warn!(
                    steps = *steps,
                    "Rolling back many migrations at once; consider smaller steps"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[tokio::test]
    async fn test_execute_serve_dry_run() {
        let cli = Cli::try_parse_from(["conveyor", "serve", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_worker_dry_run() {
        let cli = Cli::try_parse_from(["conveyor", "worker", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_coordinator_dry_run() {
        let cli = Cli::try_parse_from(["conveyor", "coordinator", "--dry-run"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_execute_migrate_without_database() {
        let cli = Cli::try_parse_from(["conveyor", "migrate"]).unwrap();
        assert!(execute_command(&cli, Settings::default()).await.is_err());
    }
}
