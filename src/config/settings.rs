//! Configuration settings structures for conveyor
//!
//! Every section deserializes with defaults so a partial `default.toml`
//! (or none of a section at all) still yields a runnable configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::error::ConfigError;
use crate::logger::{ConsoleConfig, FileConfig, LogFormat, LoggerConfig};

// ============================================================================
// Default value functions
// ============================================================================

fn default_app_name() -> String {
    "conveyor".to_string()
}

fn default_app_version() -> String {
    crate::pkg_version().to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_request_timeout() -> u64 {
    30
}

fn default_keep_alive_timeout() -> u64 {
    75
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_log_path() -> String {
    "logs/conveyor.log".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_task_types() -> Vec<String> {
    crate::jobs::tasks::BUILTIN_TASK_TYPES
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_max_retries() -> i32 {
    3
}

fn default_max_retries_limit() -> i32 {
    25
}

fn default_lease_duration_ms() -> u64 {
    30_000
}

/// Ceiling for the built-in `sleep` handler when the lease allows it.
const MAX_SLEEP_MS: u64 = 60_000;

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_error_backoff_ms() -> u64 {
    1_000
}

fn default_claim_attempts() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    60_000
}

fn default_jitter_ms() -> u64 {
    1_000
}

fn default_sweep_interval_ms() -> u64 {
    20_000
}

fn default_redrive_batch_size() -> u32 {
    5
}

fn default_auth_header() -> String {
    "x-user-auth".to_string()
}

fn default_rate_capacity() -> u32 {
    5
}

fn default_rate_window_ms() -> u64 {
    60_000
}

// ============================================================================
// Application / Server / Database
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    #[serde(default = "default_app_name")]
    pub name: String,

    #[serde(default = "default_app_version")]
    pub version: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_app_name(),
            version: default_app_version(),
        }
    }
}

/// Axum HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Keep-alive timeout in seconds
    #[serde(default = "default_keep_alive_timeout")]
    pub keep_alive_timeout: u64,
}

impl ServerConfig {
    /// Get the full server address as "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout: default_request_timeout(),
            keep_alive_timeout: default_keep_alive_timeout(),
        }
    }
}

/// PostgreSQL connection pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,

    /// Run pending migrations when a role starts
    #[serde(default)]
    pub auto_migrate: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            auto_migrate: false,
        }
    }
}

// ============================================================================
// Logger Settings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub colored: bool,
}

impl Default for ConsoleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            colored: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSettings {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_log_path")]
    pub path: String,

    #[serde(default = "default_true")]
    pub append: bool,

    /// Log format: "full", "compact", or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for FileSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_log_path(),
            append: true,
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerSettings {
    /// Log level or full `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub console: ConsoleSettings,

    #[serde(default)]
    pub file: FileSettings,
}

impl Default for LoggerSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            console: ConsoleSettings::default(),
            file: FileSettings::default(),
        }
    }
}

impl LoggerSettings {
    /// Convert the file representation into the runtime logger configuration.
    pub fn into_logger_config(self) -> Result<LoggerConfig, ConfigError> {
        let format = self
            .file
            .format
            .parse::<LogFormat>()
            .map_err(|e| ConfigError::validation("logger.file.format", e.to_string()))?;

        let config = LoggerConfig {
            level: self.level,
            console: ConsoleConfig {
                enabled: self.console.enabled,
                colored: self.console.colored,
            },
            file: FileConfig {
                enabled: self.file.enabled,
                path: PathBuf::from(self.file.path),
                append: self.file.append,
                format,
            },
        };

        config
            .validate()
            .map_err(|e| ConfigError::validation("logger", e.to_string()))?;
        Ok(config)
    }
}

// ============================================================================
// Job engine
// ============================================================================

/// Backoff curve applied after a handler failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Upper bound (exclusive) of the uniform jitter added to every delay
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
        }
    }
}

/// Submission defaults and worker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Task types accepted at submission; each needs a registered handler
    #[serde(default = "default_task_types")]
    pub task_types: Vec<String>,

    #[serde(default = "default_max_retries")]
    pub default_max_retries: i32,

    /// Largest `maxRetries` a client may request
    #[serde(default = "default_max_retries_limit")]
    pub max_retries_limit: i32,

    #[serde(default = "default_lease_duration_ms")]
    pub lease_duration_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Pause after a storage error inside the worker loop
    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Immediate re-selections after a lost claim race, per poll
    #[serde(default = "default_claim_attempts")]
    pub claim_attempts: u32,

    /// Longest run of the built-in `sleep` handler; must stay below the lease.
    /// Unset means four fifths of the lease, at most 60 s.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sleep_max_ms: Option<u64>,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            task_types: default_task_types(),
            default_max_retries: default_max_retries(),
            max_retries_limit: default_max_retries_limit(),
            lease_duration_ms: default_lease_duration_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            claim_attempts: default_claim_attempts(),
            sleep_max_ms: None,
            retry: RetryConfig::default(),
        }
    }
}

impl JobsConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Effective cap for the `sleep` handler. A sleep that outlives its lease
    /// is reclaimed mid-run and never completes.
    pub fn sleep_cap_ms(&self) -> u64 {
        self.sleep_max_ms.unwrap_or_else(|| {
            (self.lease_duration_ms.saturating_mul(4) / 5).min(MAX_SLEEP_MS)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,

    #[serde(default = "default_error_backoff_ms")]
    pub error_backoff_ms: u64,

    /// Maximum dead-lettered jobs returned to `pending` per sweep
    #[serde(default = "default_redrive_batch_size")]
    pub redrive_batch_size: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            sweep_interval_ms: default_sweep_interval_ms(),
            error_backoff_ms: default_error_backoff_ms(),
            redrive_batch_size: default_redrive_batch_size(),
        }
    }
}

impl CoordinatorConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

// ============================================================================
// Auth / Rate limiting
// ============================================================================

/// Caller role; `Admin` sees every owner's jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Client,
}

impl Role {
    pub fn is_elevated(self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEntry {
    pub token: String,
    pub user_id: String,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Request header carrying the static token
    #[serde(default = "default_auth_header")]
    pub header: String,

    #[serde(default)]
    pub tokens: Vec<TokenEntry>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: default_auth_header(),
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bucket size; also the number of requests allowed per window
    #[serde(default = "default_rate_capacity")]
    pub capacity: u32,

    /// Time for an empty bucket to refill completely
    #[serde(default = "default_rate_window_ms")]
    pub window_ms: u64,

    #[serde(default = "default_true")]
    pub admin_bypass: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_rate_capacity(),
            window_ms: default_rate_window_ms(),
            admin_bypass: true,
        }
    }
}

// ============================================================================
// Main Settings Structure
// ============================================================================

/// Complete application settings, shared by every process role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerSettings,

    #[serde(default)]
    pub jobs: JobsConfig,

    #[serde(default)]
    pub coordinator: CoordinatorConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arb_server_config() -> impl Strategy<Value = ServerConfig> {
        (
            prop_oneof![Just("127.0.0.1".to_string()), Just("0.0.0.0".to_string())],
            1u16..=65535u16,
            1u64..=300u64,
            1u64..=300u64,
        )
            .prop_map(|(host, port, request_timeout, keep_alive_timeout)| ServerConfig {
                host,
                port,
                request_timeout,
                keep_alive_timeout,
            })
    }

    fn arb_jobs_config() -> impl Strategy<Value = JobsConfig> {
        (
            prop::collection::vec("[a-z][a-zA-Z]{2,12}", 1..5),
            0i32..=10,
            1u64..=120_000,
            1u64..=5_000,
            1u32..=10,
            (1u64..=5_000, 5_000u64..=120_000, 0u64..=2_000),
        )
            .prop_map(
                |(task_types, default_max_retries, lease, poll, claim_attempts, (base, cap, jitter))| {
                    JobsConfig {
                        task_types,
                        default_max_retries,
                        max_retries_limit: 25,
                        lease_duration_ms: lease,
                        poll_interval_ms: poll,
                        error_backoff_ms: 1_000,
                        claim_attempts,
                        sleep_max_ms: None,
                        retry: RetryConfig {
                            base_delay_ms: base,
                            max_delay_ms: cap,
                            jitter_ms: jitter,
                        },
                    }
                },
            )
    }

    fn arb_coordinator_config() -> impl Strategy<Value = CoordinatorConfig> {
        (1u64..=600_000, 1u64..=10_000, 1u32..=100).prop_map(
            |(sweep_interval_ms, error_backoff_ms, redrive_batch_size)| CoordinatorConfig {
                sweep_interval_ms,
                error_backoff_ms,
                redrive_batch_size,
            },
        )
    }

    fn arb_auth_config() -> impl Strategy<Value = AuthConfig> {
        prop::collection::vec(
            (
                "[a-f0-9]{8}",
                "[0-9]{1,3}",
                prop_oneof![Just(Role::Admin), Just(Role::Client)],
            ),
            0..4,
        )
        .prop_map(|entries| AuthConfig {
            header: default_auth_header(),
            tokens: entries
                .into_iter()
                .map(|(token, user_id, role)| TokenEntry {
                    token,
                    user_id,
                    role,
                })
                .collect(),
        })
    }

    fn arb_settings() -> impl Strategy<Value = Settings> {
        (
            arb_server_config(),
            arb_jobs_config(),
            arb_coordinator_config(),
            arb_auth_config(),
            any::<bool>(),
        )
            .prop_map(|(server, jobs, coordinator, auth, limiter_enabled)| Settings {
                server,
                jobs,
                coordinator,
                auth,
                rate_limit: RateLimitConfig {
                    enabled: limiter_enabled,
                    ..RateLimitConfig::default()
                },
                ..Settings::default()
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_settings_round_trip_serialization(settings in arb_settings()) {
            let toml_str = toml::to_string(&settings).expect("Settings should serialize to TOML");
            let deserialized: Settings = toml::from_str(&toml_str).expect("TOML should deserialize back");
            prop_assert_eq!(settings, deserialized);
        }
    }

    #[test]
    fn test_engine_defaults() {
        let jobs = JobsConfig::default();
        assert_eq!(jobs.lease_duration_ms, 30_000);
        assert_eq!(jobs.poll_interval_ms, 500);
        assert_eq!(jobs.default_max_retries, 3);
        assert_eq!(jobs.retry.base_delay_ms, 1_000);
        assert_eq!(jobs.retry.max_delay_ms, 60_000);
        assert_eq!(jobs.retry.jitter_ms, 1_000);
        assert_eq!(
            jobs.task_types,
            vec!["sleep", "sendEmail", "webhook", "transform", "failureTest"]
        );

        let coordinator = CoordinatorConfig::default();
        assert_eq!(coordinator.sweep_interval(), Duration::from_secs(20));
        assert_eq!(coordinator.redrive_batch_size, 5);
    }

    #[test]
    fn test_sleep_cap_stays_below_lease() {
        let mut jobs = JobsConfig::default();
        assert_eq!(jobs.sleep_cap_ms(), 24_000);

        jobs.lease_duration_ms = 300_000;
        assert_eq!(jobs.sleep_cap_ms(), 60_000);

        jobs.lease_duration_ms = 1;
        assert_eq!(jobs.sleep_cap_ms(), 0);

        jobs.sleep_max_ms = Some(5_000);
        assert_eq!(jobs.sleep_cap_ms(), 5_000);
    }

    #[test]
    fn test_partial_section_fills_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[jobs]
lease_duration_ms = 45000

[auth]
tokens = [{ token = "t-1", user_id = "1", role = "admin" }]
"#,
        )
        .unwrap();

        assert_eq!(settings.jobs.lease_duration_ms, 45_000);
        assert_eq!(settings.jobs.poll_interval_ms, 500);
        assert_eq!(settings.auth.header, "x-user-auth");
        assert_eq!(settings.auth.tokens[0].role, Role::Admin);
        assert!(settings.rate_limit.enabled);
    }

    #[test]
    fn test_logger_settings_conversion_rejects_unknown_format() {
        let settings = LoggerSettings {
            file: FileSettings {
                format: "xml".to_string(),
                ..FileSettings::default()
            },
            ..LoggerSettings::default()
        };
        assert!(settings.into_logger_config().is_err());
    }

    #[test]
    fn test_server_address() {
        assert_eq!(ServerConfig::default().address(), "127.0.0.1:3000");
    }
}
