//! Error handler for converting AppError to HTTP responses.
//!
//! Internal failures are logged with their source chain and rendered with a
//! sanitized message.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::api::dto::ErrorResponse;
use crate::error::AppError;

/// Maps an AppError variant to its corresponding HTTP status code.
pub fn error_to_status_code(error: &AppError) -> StatusCode {
    match error {
        AppError::NotFound { .. } => StatusCode::NOT_FOUND,
        AppError::Duplicate { .. } => StatusCode::CONFLICT,
        AppError::Validation { .. } => StatusCode::BAD_REQUEST,
        AppError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        AppError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
        AppError::Forbidden { .. } => StatusCode::FORBIDDEN,
        AppError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
        AppError::Database { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::Configuration { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AppError::ConnectionPool { .. } => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_body(error: &AppError) -> ErrorResponse {
    match error {
        AppError::NotFound {
            entity,
            field,
            value,
        } => ErrorResponse::not_found_error(entity, field, value),
        AppError::Duplicate {
            entity,
            field,
            value,
        } => ErrorResponse::duplicate_error(entity, field, value),
        AppError::Validation { field, reason } => ErrorResponse::validation_error(field, reason),
        AppError::BadRequest { message } => ErrorResponse::new("BAD_REQUEST", message),
        AppError::Unauthorized { message } => ErrorResponse::new("UNAUTHORIZED", message),
        AppError::Forbidden { message } => ErrorResponse::new("FORBIDDEN", message),
        AppError::TooManyRequests { retry_after_secs } => {
            ErrorResponse::new("RATE_LIMITED", "Too many requests").with_details(json!({
                "retryAfterSeconds": retry_after_secs
            }))
        }
        AppError::Database { operation, .. } => ErrorResponse::new(
            "DATABASE_ERROR",
            &format!("Database operation failed: {}", operation),
        )
        .with_details(json!({
            "operation": operation
        })),
        AppError::Configuration { key, .. } => {
            ErrorResponse::new("CONFIGURATION_ERROR", &format!("Configuration error: {}", key))
                .with_details(json!({
                    "key": key
                }))
        }
        AppError::ConnectionPool { .. } => {
            ErrorResponse::new("SERVICE_UNAVAILABLE", "Database connection unavailable")
        }
        AppError::Internal { .. } => ErrorResponse::new("INTERNAL_ERROR", "An internal error occurred"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = error_to_status_code(&self);
        if status.is_server_error() {
            tracing::error!(error = ?self, "Request failed");
        }

        let mut response = (status, Json(error_body(&self))).into_response();

        if let AppError::TooManyRequests { retry_after_secs } = self
            && let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string())
        {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AppError::job_not_found("x"), StatusCode::NOT_FOUND),
            (AppError::validation("taskType", "Invalid task type"), StatusCode::BAD_REQUEST),
            (
                AppError::Unauthorized {
                    message: "no".to_string(),
                },
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::Forbidden {
                    message: "no".to_string(),
                },
                StatusCode::FORBIDDEN,
            ),
            (
                AppError::TooManyRequests {
                    retry_after_secs: 3,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::ConnectionPool {
                    source: anyhow::anyhow!("down"),
                },
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AppError::Internal {
                    source: anyhow::anyhow!("boom"),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error_to_status_code(&error), expected);
        }
    }

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let response = AppError::TooManyRequests {
            retry_after_secs: 7,
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "7");
    }

    #[test]
    fn test_internal_errors_are_sanitized() {
        let body = error_body(&AppError::Internal {
            source: anyhow::anyhow!("password=hunter2"),
        });
        assert_eq!(body.message, "An internal error occurred");
        assert!(body.details.is_none());
    }

    #[test]
    fn test_forbidden_message_passes_through() {
        let body = error_body(&AppError::Forbidden {
            message: "Not authorised to fetch this job".to_string(),
        });
        assert_eq!(body.code, "FORBIDDEN");
        assert_eq!(body.message, "Not authorised to fetch this job");
    }
}
