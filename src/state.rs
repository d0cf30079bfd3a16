//! Application state for Axum web framework.
//!
//! Contains shared services and resources that are accessible
//! across all request handlers.

use std::sync::Arc;

use crate::api::middleware::{RateLimiter, TokenTable};
use crate::config::Settings;
use crate::error::AppResult;
use crate::jobs::Clock;
use crate::repositories::Repositories;
use crate::services::Services;

/// Application state containing all shared services and resources.
///
/// Cloning is cheap; everything inside is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub services: Services,
    pub settings: Arc<Settings>,
    pub tokens: Arc<TokenTable>,
    pub rate_limiter: Arc<RateLimiter>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Builds services over `repos` and the auth/rate-limit tables from `settings`.
    ///
    /// # Errors
    /// `Configuration` when the auth header name is not a valid HTTP header.
    pub fn new(repos: Repositories, settings: Settings, clock: Arc<dyn Clock>) -> AppResult<Self> {
        let services = Services::new(repos, clock.clone(), &settings.jobs);
        let tokens = TokenTable::from_config(&settings.auth)?;
        let rate_limiter = RateLimiter::new(settings.rate_limit.clone(), clock.clone());

        Ok(Self {
            services,
            settings: Arc::new(settings),
            tokens: Arc::new(tokens),
            rate_limiter: Arc::new(rate_limiter),
            clock,
        })
    }
}
