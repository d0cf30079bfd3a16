//! HTTP middleware: request ids, request logging, authentication, rate
//! limiting and the `AppError` response mapping.

pub mod auth;
pub mod error_handler;
pub mod logging;
pub mod rate_limit;
pub mod request_id;

pub use auth::{AuthUser, TokenTable, auth_middleware};
pub use error_handler::error_to_status_code;
pub use logging::logging_middleware;
pub use rate_limit::{RateDecision, RateLimiter, rate_limit_middleware};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};
