//! Configuration merger for CLI arguments and config files
//!
//! CLI arguments override file and environment configuration.

use super::parser::{Cli, Commands};
use crate::config::error::ConfigError;
use crate::config::{ConfigLoader, settings::Settings};

/// Applies CLI overrides on top of the loaded settings.
pub struct ConfigurationMerger {
    base_config: Settings,
}

impl ConfigurationMerger {
    pub fn new(base_config: Settings) -> Self {
        Self { base_config }
    }

    /// Load the base settings honoring `--config` and `--env`.
    ///
    /// # Errors
    /// Returns ConfigError if configuration loading or validation fails
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let mut loader = ConfigLoader::new()?;
        if let Some(env) = cli.env {
            loader = loader.with_environment(env.into());
        }
        if let Some(path) = &cli.config {
            loader = loader.with_file(path);
        }

        Ok(Self::new(loader.load()?))
    }

    /// Merge CLI arguments with the base configuration and re-validate.
    pub fn merge_cli_args(&self, cli: &Cli) -> Result<Settings, ConfigError> {
        let mut config = self.base_config.clone();

        Self::apply_global_overrides(&mut config, cli);

        if let Some(ref command) = cli.command {
            Self::apply_command_overrides(&mut config, command);
        }

        config.validate()?;

        Ok(config)
    }

    fn apply_global_overrides(config: &mut Settings, cli: &Cli) {
        if cli.verbose {
            config.logger.level = "debug".to_string();
        } else if cli.quiet {
            config.logger.level = "error".to_string();
        }
    }

    fn apply_command_overrides(config: &mut Settings, command: &Commands) {
        match command {
            Commands::Serve {
                host,
                port,
                log_level,
                dry_run: _,
            } => {
                if let Some(host_addr) = host {
                    config.server.host = host_addr.clone();
                }
                if let Some(port_num) = port {
                    config.server.port = *port_num;
                }
                // Command-level log level beats --verbose/--quiet
                if let Some(level) = log_level {
                    config.logger.level = (*level).into();
                }
            }
            Commands::Worker {
                lease_ms, poll_ms, ..
            } => {
                if let Some(lease) = lease_ms {
                    config.jobs.lease_duration_ms = *lease;
                }
                if let Some(poll) = poll_ms {
                    config.jobs.poll_interval_ms = *poll;
                }
            }
            Commands::Coordinator {
                sweep_ms,
                redrive_batch,
                ..
            } => {
                if let Some(sweep) = sweep_ms {
                    config.coordinator.sweep_interval_ms = *sweep;
                }
                if let Some(batch) = redrive_batch {
                    config.coordinator.redrive_batch_size = *batch;
                }
            }
            Commands::Migrate { .. } => {}
        }
    }

    pub fn config(&self) -> &Settings {
        &self.base_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn merge(args: &[&str]) -> Settings {
        let cli = Cli::try_parse_from(args).unwrap();
        ConfigurationMerger::new(Settings::default())
            .merge_cli_args(&cli)
            .unwrap()
    }

    #[test]
    fn test_verbose_and_quiet_flags() {
        assert_eq!(merge(&["conveyor", "--verbose"]).logger.level, "debug");
        assert_eq!(merge(&["conveyor", "--quiet"]).logger.level, "error");
    }

    #[test]
    fn test_serve_overrides() {
        let settings = merge(&["conveyor", "serve", "--host", "0.0.0.0", "--port", "8080"]);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
    }

    #[test]
    fn test_command_log_level_overrides_global() {
        let settings = merge(&["conveyor", "--verbose", "serve", "--log-level", "warn"]);
        assert_eq!(settings.logger.level, "warn");
    }

    #[test]
    fn test_worker_overrides() {
        let settings = merge(&["conveyor", "worker", "--lease-ms", "45000", "--poll-ms", "100"]);
        assert_eq!(settings.jobs.lease_duration_ms, 45_000);
        assert_eq!(settings.jobs.poll_interval_ms, 100);
    }

    #[test]
    fn test_coordinator_overrides() {
        let settings = merge(&[
            "conveyor",
            "coordinator",
            "--sweep-ms",
            "5000",
            "--redrive-batch",
            "20",
        ]);
        assert_eq!(settings.coordinator.sweep_interval_ms, 5_000);
        assert_eq!(settings.coordinator.redrive_batch_size, 20);
    }

    #[test]
    fn test_base_config_untouched() {
        let merger = ConfigurationMerger::new(Settings::default());
        let cli = Cli::try_parse_from(["conveyor", "serve", "--port", "9000"]).unwrap();
        merger.merge_cli_args(&cli).unwrap();
        assert_eq!(merger.config().server.port, 3000);
    }
}
