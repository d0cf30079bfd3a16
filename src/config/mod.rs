//! Configuration management for conveyor
//!
//! # Configuration Priority (lowest to highest)
//! 1. `default.toml` - Base default configuration
//! 2. `{environment}.toml` - Environment-specific configuration
//! 3. `local.toml` - Local overrides (not committed to version control)
//! 4. `CONVEYOR_*` environment variables, `__` separating nested keys
//!    (`CONVEYOR_JOBS__LEASE_DURATION_MS=45000`)

pub mod environment;
pub mod error;
pub mod loader;
pub mod settings;
pub mod validation;

pub use environment::Environment;
pub use loader::ConfigLoader;
pub use settings::{
    AuthConfig, CoordinatorConfig, DatabaseConfig, JobsConfig, RateLimitConfig, RetryConfig,
    Role, Settings, TokenEntry,
};
