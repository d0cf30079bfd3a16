use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

pub const HEALTH_TAG: &str = "Health";
pub const JOB_TAG: &str = "Jobs";
pub const LOG_TAG: &str = "Logs";
pub const DASHBOARD_TAG: &str = "Dashboard";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Conveyor",
        description = "Durable job queue: submit jobs, follow them through retries and the dead-letter queue.",
    ),
    modifiers(&SecurityAddon),
    components(
        schemas(
            crate::api::dto::ErrorResponse,
            crate::models::JobStatus,
            crate::models::OwnerType,
            crate::models::LogLevel,
        )
    ),
    tags(
        (name = HEALTH_TAG, description = "Health check endpoints"),
        (name = JOB_TAG, description = "Job submission and query endpoints"),
        (name = LOG_TAG, description = "Audit trail endpoints"),
        (name = DASHBOARD_TAG, description = "Operator dashboard endpoints"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "userAuth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-user-auth",
                    "Static per-user token",
                ))),
            )
        }
    }
}
