//! Operator dashboard endpoints. Same data as the client routes, without
//! rate limiting, plus the status report.

use axum::{Extension, Json, extract::State};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use super::jobs::fetch_jobs;
use super::logs::fetch_logs;
use crate::api::doc::DASHBOARD_TAG;
use crate::api::dto::{
    DataResponse, ErrorResponse, JobListQuery, JobListResponse, LogListQuery, LogListResponse,
    ReportResponse,
};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::ValidatedQuery;

pub fn dashboard_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new()
        .routes(routes!(dashboard_jobs))
        .routes(routes!(dashboard_report))
        .routes(routes!(dashboard_logs))
}

#[utoipa::path(
    get,
    path = "/v1/dashboard/jobs",
    tag = DASHBOARD_TAG,
    params(JobListQuery),
    responses(
        (status = 200, description = "One page of jobs", body = DataResponse<JobListResponse>),
        (status = 403, description = "Job belongs to another user", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn dashboard_jobs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<JobListQuery>,
) -> AppResult<Json<DataResponse<JobListResponse>>> {
    Ok(Json(DataResponse::new(fetch_jobs(&state, &user, query).await?)))
}

/// Counts per lifecycle bucket across every owner.
#[utoipa::path(
    get,
    path = "/v1/dashboard/jobs/report",
    tag = DASHBOARD_TAG,
    responses(
        (status = 200, description = "Status report", body = DataResponse<ReportResponse>)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn dashboard_report(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ReportResponse>>> {
    let report = state.services.jobs.report().await?;
    Ok(Json(DataResponse::new(ReportResponse::from(report))))
}

#[utoipa::path(
    get,
    path = "/v1/dashboard/logs",
    tag = DASHBOARD_TAG,
    params(LogListQuery),
    responses(
        (status = 200, description = "One page of audit entries", body = DataResponse<LogListResponse>)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn dashboard_logs(
    State(state): State<AppState>,
    ValidatedQuery(query): ValidatedQuery<LogListQuery>,
) -> AppResult<Json<DataResponse<LogListResponse>>> {
    Ok(Json(DataResponse::new(fetch_logs(&state, query).await?)))
}
