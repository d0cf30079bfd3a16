//! Router configuration for the API.

use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::doc::ApiDoc;
use crate::api::handlers;
use crate::api::middleware::{
    auth_middleware, logging_middleware, rate_limit_middleware, request_id_middleware,
};
use crate::state::AppState;

/// Creates the main application router with all routes and middleware.
///
/// # Middleware Order
/// Layers run outermost first: request id, then logging, then (per group)
/// authentication and rate limiting.
///
/// # Routes
/// - `/health`, `/health/live` - open
/// - `/v1/jobs`, `/v1/logs` - authenticated, rate limited
/// - `/v1/dashboard/*` - authenticated
/// - `/swagger-ui` - OpenAPI UI
pub fn create_router(state: AppState) -> Router {
    // Layers on a group apply to that group only; the later `.layer` runs first.
    let limited = OpenApiRouter::new()
        .merge(handlers::jobs::job_routes())
        .merge(handlers::logs::log_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let dashboard = handlers::dashboard::dashboard_routes()
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(handlers::health::health_routes())
        .merge(limited)
        .merge(dashboard)
        .split_for_parts();

    router
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(CorsLayer::permissive())
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
