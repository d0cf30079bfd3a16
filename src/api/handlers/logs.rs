//! Audit log listing.

use axum::{Json, extract::State};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::LOG_TAG;
use crate::api::dto::{DataResponse, ErrorResponse, LogListQuery, LogListResponse};
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::ValidatedQuery;

pub fn log_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_logs))
}

pub(crate) async fn fetch_logs(state: &AppState, query: LogListQuery) -> AppResult<LogListResponse> {
    let (filter, limit) = query.into_filter();
    let page = state.services.logs.list(filter, limit).await?;
    Ok(LogListResponse::from(page))
}

/// GET /v1/logs - Audit entries, newest first
#[utoipa::path(
    get,
    path = "/v1/logs",
    tag = LOG_TAG,
    params(LogListQuery),
    responses(
        (status = 200, description = "One page of audit entries", body = DataResponse<LogListResponse>),
        (status = 401, description = "Missing or unknown token", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn list_logs(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<LogListQuery>,
) -> AppResult<Json<DataResponse<LogListResponse>>> {
    Ok(Json(DataResponse::new(fetch_logs(&state, query).await?)))
}
