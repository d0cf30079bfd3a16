//! Configuration validation logic
//!
//! Each section validates itself; `Settings::validate` stops at the first error.

use std::collections::HashSet;

use crate::config::error::ConfigError;
use crate::config::settings::{
    AuthConfig, CoordinatorConfig, DatabaseConfig, JobsConfig, LoggerSettings, RateLimitConfig,
    ServerConfig, Settings,
};

const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

const VALID_LOG_FORMATS: &[&str] = &["full", "compact", "json"];

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::validation(
                "server.port",
                "Port must be between 1 and 65535.",
            ));
        }

        if self.request_timeout == 0 {
            return Err(ConfigError::validation(
                "server.request_timeout",
                "Request timeout must be greater than 0 seconds.",
            ));
        }

        if self.keep_alive_timeout == 0 {
            return Err(ConfigError::validation(
                "server.keep_alive_timeout",
                "Keep-alive timeout must be greater than 0 seconds.",
            ));
        }

        Ok(())
    }
}

impl DatabaseConfig {
    /// Validate database configuration
    ///
    /// # Validation Rules
    /// - URL must be a postgres URL
    /// - Min connections must be > 0 and not exceed max connections
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::validation(
                "database.url",
                "Database URL is required. Set CONVEYOR_DATABASE__URL or database.url.",
            ));
        }

        if !(self.url.starts_with("postgres://") || self.url.starts_with("postgresql://")) {
            return Err(ConfigError::validation(
                "database.url",
                "Expected format: postgres://[user:password@]host[:port]/database",
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections",
                "Max connections must be greater than 0.",
            ));
        }

        if self.min_connections == 0 {
            return Err(ConfigError::validation(
                "database.min_connections",
                "Min connections must be greater than 0.",
            ));
        }

        if self.min_connections > self.max_connections {
            return Err(ConfigError::validation(
                "database.min_connections",
                format!(
                    "Min connections ({}) cannot exceed max connections ({}).",
                    self.min_connections, self.max_connections
                ),
            ));
        }

        Ok(())
    }
}

impl LoggerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Plain levels are checked strictly; anything with a directive is left to EnvFilter.
        let level = self.level.to_lowercase();
        if !level.contains('=') && !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::validation(
                "logger.level",
                format!(
                    "Invalid log level '{}'. Valid levels are: {}",
                    self.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        if self.file.enabled && self.file.path.trim().is_empty() {
            return Err(ConfigError::validation(
                "logger.file.path",
                "File path is required when file logging is enabled.",
            ));
        }

        if !VALID_LOG_FORMATS.contains(&self.file.format.to_lowercase().as_str()) {
            return Err(ConfigError::validation(
                "logger.file.format",
                format!(
                    "Invalid log format '{}'. Valid formats are: {}",
                    self.file.format,
                    VALID_LOG_FORMATS.join(", ")
                ),
            ));
        }

        if !self.console.enabled && !self.file.enabled {
            return Err(ConfigError::validation(
                "logger",
                "At least one output (console or file) must be enabled.",
            ));
        }

        Ok(())
    }
}

impl JobsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.task_types.is_empty() {
            return Err(ConfigError::validation(
                "jobs.task_types",
                "At least one task type must be configured.",
            ));
        }

        let mut seen = HashSet::new();
        for task_type in &self.task_types {
            if task_type.trim().is_empty() {
                return Err(ConfigError::validation(
                    "jobs.task_types",
                    "Task types cannot be blank.",
                ));
            }
            if !seen.insert(task_type.as_str()) {
                return Err(ConfigError::validation(
                    "jobs.task_types",
                    format!("Task type '{}' is listed twice.", task_type),
                ));
            }
        }

        if self.default_max_retries < 0 || self.max_retries_limit < 0 {
            return Err(ConfigError::validation(
                "jobs.default_max_retries",
                "Retry ceilings cannot be negative.",
            ));
        }

        if self.default_max_retries > self.max_retries_limit {
            return Err(ConfigError::validation(
                "jobs.default_max_retries",
                format!(
                    "Default max retries ({}) exceeds max_retries_limit ({}).",
                    self.default_max_retries, self.max_retries_limit
                ),
            ));
        }

        if self.lease_duration_ms == 0 {
            return Err(ConfigError::validation(
                "jobs.lease_duration_ms",
                "Lease duration must be greater than 0.",
            ));
        }

        if let Some(sleep_max_ms) = self.sleep_max_ms
            && sleep_max_ms >= self.lease_duration_ms
        {
            return Err(ConfigError::validation(
                "jobs.sleep_max_ms",
                format!(
                    "Sleep cap ({}ms) must be shorter than the lease ({}ms).",
                    sleep_max_ms, self.lease_duration_ms
                ),
            ));
        }

        if self.poll_interval_ms == 0 {
            return Err(ConfigError::validation(
                "jobs.poll_interval_ms",
                "Poll interval must be greater than 0.",
            ));
        }

        if self.claim_attempts == 0 {
            return Err(ConfigError::validation(
                "jobs.claim_attempts",
                "Claim attempts must be at least 1.",
            ));
        }

        if self.retry.base_delay_ms == 0 || self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::validation(
                "jobs.retry.base_delay_ms",
                "Base delay must be positive and not exceed max_delay_ms.",
            ));
        }

        Ok(())
    }
}

impl CoordinatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sweep_interval_ms == 0 {
            return Err(ConfigError::validation(
                "coordinator.sweep_interval_ms",
                "Sweep interval must be greater than 0.",
            ));
        }

        if self.redrive_batch_size == 0 {
            return Err(ConfigError::validation(
                "coordinator.redrive_batch_size",
                "Redrive batch size must be at least 1.",
            ));
        }

        Ok(())
    }
}

impl AuthConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.header.trim().is_empty() {
            return Err(ConfigError::validation("auth.header", "Header name cannot be empty."));
        }

        let mut seen = HashSet::new();
        for entry in &self.tokens {
            if entry.token.is_empty() || entry.user_id.is_empty() {
                return Err(ConfigError::validation(
                    "auth.tokens",
                    "Token and user_id cannot be empty.",
                ));
            }
            if !seen.insert(entry.token.as_str()) {
                return Err(ConfigError::validation(
                    "auth.tokens",
                    format!("Token for user '{}' is duplicated.", entry.user_id),
                ));
            }
        }

        Ok(())
    }
}

impl RateLimitConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enabled && (self.capacity == 0 || self.window_ms == 0) {
            return Err(ConfigError::validation(
                "rate_limit",
                "Capacity and window_ms must be positive when rate limiting is enabled.",
            ));
        }
        Ok(())
    }
}

impl Settings {
    /// Validate every section except the database, which only the roles that
    /// connect require (see [`Settings::validate_with_database`]).
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.logger.validate()?;
        self.jobs.validate()?;
        self.coordinator.validate()?;
        self.auth.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    pub fn validate_with_database(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.database.validate()
    }
}
