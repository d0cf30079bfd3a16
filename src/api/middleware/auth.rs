//! Static token authentication middleware.
//!
//! Callers present a token in the configured header (`x-user-auth` by
//! default); the token table maps it onto a user id and a role.

use std::collections::HashMap;

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderName},
    middleware::Next,
    response::Response,
};
use serde::{Deserialize, Serialize};

use crate::config::{AuthConfig, Role};
use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Extension type for authenticated user information
///
/// This is added to request extensions after successful authentication
/// and can be extracted in handlers using `Extension<AuthUser>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: String,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.is_elevated()
    }
}

/// Lookup table built once from `[auth]`.
#[derive(Debug, Clone)]
pub struct TokenTable {
    header: HeaderName,
    tokens: HashMap<String, AuthUser>,
}

impl TokenTable {
    pub fn from_config(config: &AuthConfig) -> AppResult<Self> {
        let header = HeaderName::from_bytes(config.header.to_ascii_lowercase().as_bytes())
            .map_err(|e| AppError::Configuration {
                key: "auth.header".to_string(),
                source: anyhow::Error::from(e),
            })?;

        let tokens = config
            .tokens
            .iter()
            .map(|entry| {
                (
                    entry.token.clone(),
                    AuthUser {
                        user_id: entry.user_id.clone(),
                        role: entry.role,
                    },
                )
            })
            .collect();

        Ok(Self { header, tokens })
    }

    pub fn header(&self) -> &HeaderName {
        &self.header
    }

    /// Resolve the caller from request headers.
    ///
    /// # Errors
    /// `Unauthorized` when the header is missing or the token is unknown.
    pub fn authenticate(&self, headers: &HeaderMap) -> AppResult<AuthUser> {
        let token = headers
            .get(&self.header)
            .and_then(|h| h.to_str().ok())
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Unauthorized {
                message: format!("Missing {} header", self.header),
            })?;

        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Unknown token".to_string(),
            })
    }
}

/// Authentication middleware
///
/// # Errors
/// Returns 401 Unauthorized if the header is missing or the token is unknown.
///
/// # Example
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
/// ```
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = state.tokens.authenticate(request.headers())?;
    tracing::debug!(user_id = %user.user_id, role = ?user.role, "Caller authenticated");

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
