use utoipa::OpenApi;

use crate::modules::jobs::dto::{CreateJobRequest, JobResponse, UpdateJobStatusRequest};
use crate::modules::jobs::model::{JobStatus, JobType};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::jobs::handler::create_job,
        crate::modules::jobs::handler::get_job,
        crate::modules::jobs::handler::list_project_jobs,
        crate::modules::jobs::handler::delete_job,
        crate::modules::jobs::handler::update_job_status,
    ),
    components(
        schemas(
            CreateJobRequest,
            UpdateJobStatusRequest,
            JobResponse,
            JobStatus,
            JobType,
        )
    ),
    tags(
        (name = "Jobs", description = "Media job lifecycle and dispatch")
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

use utoipa::Modify;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "worker_api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-Worker-API-Key"))),
            );
        }
    }
}
