//! Job submission and query handlers.

use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;

use crate::api::doc::JOB_TAG;
use crate::api::dto::{
    CreateJobRequest, CreateJobResponse, DataResponse, ErrorResponse, JobListQuery,
    JobListResponse,
};
use crate::api::middleware::AuthUser;
use crate::error::AppResult;
use crate::state::AppState;
use crate::utils::validate::{ValidatedJson, ValidatedQuery};

pub fn job_routes() -> OpenApiRouter<AppState> {
    OpenApiRouter::new().routes(routes!(list_jobs, create_job))
}

/// Shared by the client and dashboard listings.
pub(crate) async fn fetch_jobs(
    state: &AppState,
    user: &AuthUser,
    query: JobListQuery,
) -> AppResult<JobListResponse> {
    let page = state
        .services
        .jobs
        .query(&user.user_id, user.role, query.into_query()?)
        .await?;
    Ok(JobListResponse::from(page))
}

/// POST /v1/jobs - Submit a job
#[utoipa::path(
    post,
    path = "/v1/jobs",
    tag = JOB_TAG,
    request_body = CreateJobRequest,
    responses(
        (status = 201, description = "Job accepted", body = DataResponse<CreateJobResponse>),
        (status = 400, description = "Unknown task type or invalid maxRetries", body = ErrorResponse),
        (status = 401, description = "Missing or unknown token", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn create_job(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedJson(req): ValidatedJson<CreateJobRequest>,
) -> AppResult<(StatusCode, Json<DataResponse<CreateJobResponse>>)> {
    let job = state.services.jobs.submit(&user.user_id, req.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(DataResponse::new(CreateJobResponse::from(&job))),
    ))
}

/// GET /v1/jobs - List the caller's jobs, newest first
#[utoipa::path(
    get,
    path = "/v1/jobs",
    tag = JOB_TAG,
    params(JobListQuery),
    responses(
        (status = 200, description = "One page of jobs", body = DataResponse<JobListResponse>),
        (status = 403, description = "Job belongs to another user", body = ErrorResponse),
        (status = 404, description = "Job not found", body = ErrorResponse),
        (status = 429, description = "Rate limit exceeded", body = ErrorResponse)
    ),
    security(
        ("userAuth" = [])
    )
)]
async fn list_jobs(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    ValidatedQuery(query): ValidatedQuery<JobListQuery>,
) -> AppResult<Json<DataResponse<JobListResponse>>> {
    let jobs = fetch_jobs(&state, &user, query).await?;
    Ok(Json(DataResponse::new(jobs)))
}
