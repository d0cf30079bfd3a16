//! Per-user token bucket rate limiting.
//!
//! Each user owns a bucket of `capacity` tokens that refills continuously,
//! reaching full again `window_ms` after being emptied. Must run after
//! [`auth_middleware`](super::auth_middleware).

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use super::AuthUser;
use crate::config::RateLimitConfig;
use crate::error::AppError;
use crate::jobs::Clock;
use crate::state::AppState;

pub const RATE_LIMIT_LIMIT_HEADER: &str = "x-ratelimit-limit";
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed { remaining: u32 },
    Limited { retry_after_secs: u64 },
    Exempt,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: DashMap<String, Bucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            buckets: DashMap::new(),
            clock,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.config.capacity
    }

    /// Take one token from the caller's bucket.
    pub fn check(&self, user: &AuthUser) -> RateDecision {
        if !self.config.enabled || (self.config.admin_bypass && user.is_admin()) {
            return RateDecision::Exempt;
        }

        let now = self.clock.now_ms();
        let capacity = f64::from(self.config.capacity);
        let window = self.config.window_ms.max(1) as f64;

        let mut bucket = self
            .buckets
            .entry(user.user_id.clone())
            .or_insert(Bucket {
                tokens: capacity,
                updated_at: now,
            });

        let elapsed = (now - bucket.updated_at).max(0) as f64;
        bucket.tokens = (bucket.tokens + elapsed * capacity / window).min(capacity);
        bucket.updated_at = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            RateDecision::Allowed {
                remaining: bucket.tokens.floor() as u32,
            }
        } else {
            let wait_ms = ((1.0 - bucket.tokens) * window / capacity).ceil();
            RateDecision::Limited {
                retry_after_secs: ((wait_ms / 1000.0).ceil() as u64).max(1),
            }
        }
    }
}

fn set_header(response: &mut Response, name: &'static str, value: u64) {
    if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(name), value);
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(user) = request.extensions().get::<AuthUser>().cloned() else {
        return AppError::Unauthorized {
            message: "Authentication required".to_string(),
        }
        .into_response();
    };

    let limiter = &state.rate_limiter;
    match limiter.check(&user) {
        RateDecision::Exempt => next.run(request).await,
        RateDecision::Allowed { remaining } => {
            let mut response = next.run(request).await;
            set_header(&mut response, RATE_LIMIT_LIMIT_HEADER, limiter.capacity().into());
            set_header(&mut response, RATE_LIMIT_REMAINING_HEADER, remaining.into());
            response
        }
        RateDecision::Limited { retry_after_secs } => {
            tracing::warn!(
                user_id = %user.user_id,
                retry_after_secs,
                "Rate limit exceeded"
            );
            let mut response = AppError::TooManyRequests { retry_after_secs }.into_response();
            set_header(&mut response, RATE_LIMIT_LIMIT_HEADER, limiter.capacity().into());
            set_header(&mut response, RATE_LIMIT_REMAINING_HEADER, 0);
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Role;
    use crate::jobs::ManualClock;

    fn limiter(clock: Arc<ManualClock>) -> RateLimiter {
        RateLimiter::new(
            RateLimitConfig {
                enabled: true,
                capacity: 5,
                window_ms: 60_000,
                admin_bypass: true,
            },
            clock,
        )
    }

    fn client(id: &str) -> AuthUser {
        AuthUser {
            user_id: id.to_string(),
            role: Role::Client,
        }
    }

    #[test]
    fn test_bucket_drains_then_limits() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock);
        let user = client("2");

        for expected in (0..5).rev() {
            assert_eq!(
                limiter.check(&user),
                RateDecision::Allowed {
                    remaining: expected
                }
            );
        }
        // One token refills every 12 seconds.
        assert_eq!(
            limiter.check(&user),
            RateDecision::Limited {
                retry_after_secs: 12
            }
        );
    }

    #[test]
    fn test_bucket_refills_over_time() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock.clone());
        let user = client("2");

        for _ in 0..5 {
            limiter.check(&user);
        }
        clock.advance(12_000);
        assert_eq!(limiter.check(&user), RateDecision::Allowed { remaining: 0 });

        clock.advance(120_000);
        assert_eq!(limiter.check(&user), RateDecision::Allowed { remaining: 4 });
    }

    #[test]
    fn test_buckets_are_per_user() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock);

        for _ in 0..5 {
            limiter.check(&client("2"));
        }
        assert!(matches!(
            limiter.check(&client("3")),
            RateDecision::Allowed { remaining: 4 }
        ));
    }

    #[test]
    fn test_admin_bypass() {
        let clock = Arc::new(ManualClock::new(0));
        let limiter = limiter(clock);
        let admin = AuthUser {
            user_id: "1".to_string(),
            role: Role::Admin,
        };

        for _ in 0..20 {
            assert_eq!(limiter.check(&admin), RateDecision::Exempt);
        }
    }

    #[test]
    fn test_disabled_limiter_is_exempt() {
        let limiter = RateLimiter::new(
            RateLimitConfig {
                enabled: false,
                ..RateLimitConfig::default()
            },
            Arc::new(ManualClock::new(0)),
        );
        assert_eq!(limiter.check(&client("2")), RateDecision::Exempt);
    }
}
