//! CLI argument parsing with clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Durable SQL-backed job queue
#[derive(Parser, Debug)]
#[command(name = "conveyor")]
#[command(about = "Durable SQL-backed job queue with leases, retries and a dead-letter queue")]
#[command(long_about = "
Conveyor is a durable job queue backed by PostgreSQL. One binary hosts every
role: the HTTP API, workers that claim and execute jobs, and the coordinator
that reclaims expired leases, dead-letters exhausted jobs and re-enables
retries.

EXAMPLES:
    # Start the API server with default configuration
    conveyor serve

    # Run a worker with a fixed id and a 45 second lease
    conveyor worker --worker-id worker-a --lease-ms 45000

    # Run the coordinator, or a single sweep from cron
    conveyor coordinator
    conveyor coordinator --once

    # Use a custom configuration file in production mode
    conveyor --config /etc/conveyor/production.toml --env production serve

    # Check configuration without starting anything
    conveyor worker --dry-run

    # Run, preview or roll back database migrations
    conveyor migrate
    conveyor migrate --dry-run
    conveyor migrate --rollback 1
")]
#[command(version = crate::build::CLAP_LONG_VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file path
    ///
    /// Use a single TOML file instead of the layered `config/` directory.
    #[arg(short, long, value_name = "FILE", value_parser = super::validation::validate_config_file_path)]
    pub config: Option<PathBuf>,

    /// Override environment detection
    ///
    /// Picks the `{environment}.toml` overlay. Defaults to CONVEYOR_APP_ENV.
    #[arg(short, long, value_enum)]
    pub env: Option<Environment>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the HTTP API server (default)
    Serve {
        /// Host address to bind to
        #[arg(long, value_name = "ADDRESS", value_parser = super::validation::validate_host_address)]
        host: Option<String>,

        /// Port number to listen on
        #[arg(short, long, value_name = "PORT", value_parser = super::validation::validate_port)]
        port: Option<u16>,

        /// Log level override; takes precedence over --verbose/--quiet
        #[arg(long, value_enum)]
        log_level: Option<LogLevel>,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Run one worker: claim eligible jobs and execute their handlers
    Worker {
        /// Stable worker identity; defaults to worker-<uuid>
        #[arg(long, value_name = "ID", value_parser = super::validation::validate_worker_id)]
        worker_id: Option<String>,

        /// Lease duration in milliseconds
        #[arg(long, value_name = "MS", value_parser = super::validation::validate_millis)]
        lease_ms: Option<u64>,

        /// Idle poll interval in milliseconds
        #[arg(long, value_name = "MS", value_parser = super::validation::validate_millis)]
        poll_ms: Option<u64>,

        /// Validate configuration and the handler registry, then exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Run the coordinator sweep loop
    Coordinator {
        /// Sweep interval in milliseconds
        #[arg(long, value_name = "MS", value_parser = super::validation::validate_millis)]
        sweep_ms: Option<u64>,

        /// Maximum dead-lettered jobs requeued per sweep
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(1..))]
        redrive_batch: Option<u32>,

        /// Run exactly one sweep and exit
        #[arg(long)]
        once: bool,

        /// Validate configuration and exit
        #[arg(long)]
        dry_run: bool,
    },
    /// Database migration operations
    Migrate {
        /// Show pending migrations without applying
        #[arg(long, conflicts_with = "rollback")]
        dry_run: bool,

        /// Number of migrations to roll back (1-100)
        #[arg(long, value_name = "STEPS", conflicts_with = "dry_run", value_parser = super::validation::validate_rollback_steps)]
        rollback: Option<u32>,
    },
}

/// Environment options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    #[value(name = "development", alias = "dev")]
    Development,
    #[value(name = "test")]
    Test,
    #[value(name = "staging", alias = "stage")]
    Staging,
    #[value(name = "production", alias = "prod")]
    Production,
}

/// Log level options
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Cli {
    /// Whether this invocation only validates configuration.
    pub fn is_dry_run(&self) -> bool {
        matches!(
            self.command,
            Some(Commands::Serve { dry_run: true, .. })
                | Some(Commands::Worker { dry_run: true, .. })
                | Some(Commands::Coordinator { dry_run: true, .. })
                | Some(Commands::Migrate { dry_run: true, .. })
        )
    }
}

impl From<LogLevel> for String {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => "error".to_string(),
            LogLevel::Warn => "warn".to_string(),
            LogLevel::Info => "info".to_string(),
            LogLevel::Debug => "debug".to_string(),
            LogLevel::Trace => "trace".to_string(),
        }
    }
}

impl From<Environment> for crate::config::Environment {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => crate::config::Environment::Development,
            Environment::Test => crate::config::Environment::Test,
            Environment::Staging => crate::config::Environment::Staging,
            Environment::Production => crate::config::Environment::Production,
        }
    }
}
