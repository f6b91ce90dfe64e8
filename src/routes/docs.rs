use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::dto::hire_request_dto::{
    AcceptRequestPayload, AddMessagePayload, AvailableRequestResponse, CreateHireRequestPayload,
    FeedbackPayload, FeedbackResponse, HireRequestResponse, JobStatusCounts, MessageResponse,
    ProviderDashboardStats, UpdateJobStatusPayload,
};
use crate::models::{hire_request::HireStatus, user::Role};

struct BearerAuth;

impl Modify for BearerAuth {
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
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        super::hire_requests::create_hire_request,
        super::hire_requests::my_hire_requests,
        super::hire_requests::get_hire_request,
        super::hire_requests::available_requests,
        super::hire_requests::my_jobs,
        super::hire_requests::accept_request,
        super::hire_requests::decline_request,
        super::hire_requests::update_job_status,
        super::hire_requests::cancel_request,
        super::hire_requests::add_message,
        super::hire_requests::submit_feedback,
        super::hire_requests::dashboard_stats,
    ),
    components(schemas(
        HireStatus,
        Role,
        CreateHireRequestPayload,
        AcceptRequestPayload,
        UpdateJobStatusPayload,
        AddMessagePayload,
        FeedbackPayload,
        HireRequestResponse,
        AvailableRequestResponse,
        MessageResponse,
        FeedbackResponse,
        JobStatusCounts,
        ProviderDashboardStats,
    )),
    modifiers(&BearerAuth),
    tags((name = "hire-requests", description = "Hire request lifecycle"))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
