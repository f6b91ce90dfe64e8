use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        hire_request_dto::{
            AcceptRequestPayload, AddMessagePayload, AvailableRequestResponse,
            AvailableRequestsQuery, CreateHireRequestPayload, FeedbackPayload, FeedbackResponse,
            HireRequestResponse, JobsQuery, MessageResponse, UpdateJobStatusPayload,
        },
        response::ApiResponse,
    },
    error::{Error, Result},
    middleware::auth::Identity,
    models::hire_request::HireStatus,
    routes::extract::{ApiJson, ApiPath, ApiQuery},
    services::workflow::HireAction,
    AppState,
};

fn to_responses(items: Vec<crate::models::hire_request::HireRequest>) -> Vec<HireRequestResponse> {
    items.into_iter().map(HireRequestResponse::from).collect()
}

#[utoipa::path(
    post,
    path = "/api/hire-requests",
    request_body = CreateHireRequestPayload,
    responses(
        (status = 201, description = "Hire request created", body = HireRequestResponse),
        (status = 400, description = "Invalid payload"),
        (status = 403, description = "Caller is not a customer")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn create_hire_request(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<CreateHireRequestPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let request = state.hire_service.create(&identity, payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Hire request created",
            HireRequestResponse::from(request),
        )),
    ))
}

#[utoipa::path(
    get,
    path = "/api/my-hire-requests",
    responses(
        (status = 200, description = "Caller's hire requests, newest first", body = [HireRequestResponse])
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn my_hire_requests(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse> {
    let items = state.hire_service.list_for_customer(&identity).await?;
    Ok(Json(ApiResponse::ok(to_responses(items))))
}

#[utoipa::path(
    get,
    path = "/api/hire-requests/{id}",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    responses(
        (status = 200, description = "Hire request with its messages", body = HireRequestResponse),
        (status = 403, description = "Caller is not a party to the request"),
        (status = 404, description = "Hire request not found")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn get_hire_request(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let request = state.hire_service.get_visible(&identity, id).await?;
    Ok(Json(ApiResponse::ok(HireRequestResponse::from(request))))
}

#[utoipa::path(
    get,
    path = "/api/available-requests",
    params(AvailableRequestsQuery),
    responses(
        (status = 200, description = "Pending requests open to the caller", body = [AvailableRequestResponse]),
        (status = 403, description = "Caller is not an approved provider")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn available_requests(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<AvailableRequestsQuery>,
) -> Result<impl IntoResponse> {
    query.validate()?;
    let items = state.hire_service.list_available(&identity, &query).await?;
    let body: Vec<AvailableRequestResponse> = items
        .into_iter()
        .map(|item| AvailableRequestResponse {
            request: item.request.into(),
            distance_km: item.distance_km,
        })
        .collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[utoipa::path(
    get,
    path = "/api/my-jobs",
    params(("status" = Option<String>, Query, description = "Filter by status")),
    responses(
        (status = 200, description = "Requests assigned to the caller", body = [HireRequestResponse])
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn my_jobs(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<JobsQuery>,
) -> Result<impl IntoResponse> {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(raw) => Some(
            HireStatus::parse(raw)
                .ok_or_else(|| Error::BadRequest(format!("Unknown status '{}'", raw)))?,
        ),
        None => None,
    };
    let items = state.hire_service.list_jobs(&identity, status).await?;
    Ok(Json(ApiResponse::ok(to_responses(items))))
}

#[utoipa::path(
    post,
    path = "/api/accept-request/{id}",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    request_body = AcceptRequestPayload,
    responses(
        (status = 200, description = "Request confirmed for the caller", body = HireRequestResponse),
        (status = 400, description = "Request is no longer pending"),
        (status = 403, description = "Request is addressed to another provider")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn accept_request(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    body: Bytes,
) -> Result<impl IntoResponse> {
    // An empty body accepts at the listed price.
    let price = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        serde_json::from_slice::<AcceptRequestPayload>(&body)
            .map_err(|e| Error::BadRequest(format!("Invalid accept payload: {}", e)))?
            .price
    };
    let request = state
        .hire_service
        .transition(&identity, id, HireAction::Accept { price })
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Request accepted",
        HireRequestResponse::from(request),
    )))
}

#[utoipa::path(
    post,
    path = "/api/decline-request/{id}",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    responses(
        (status = 200, description = "Request declined by the caller", body = HireRequestResponse),
        (status = 400, description = "Request is no longer pending")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn decline_request(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let request = state
        .hire_service
        .transition(&identity, id, HireAction::Decline)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Request declined",
        HireRequestResponse::from(request),
    )))
}

#[utoipa::path(
    patch,
    path = "/api/update-job-status/{id}",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    request_body = UpdateJobStatusPayload,
    responses(
        (status = 200, description = "Status changed", body = HireRequestResponse),
        (status = 400, description = "Transition not allowed from the current status"),
        (status = 403, description = "Caller may not change this request")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn update_job_status(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateJobStatusPayload>,
) -> Result<impl IntoResponse> {
    let action = HireAction::for_target(payload.status).ok_or_else(|| {
        Error::BadRequest(format!("Cannot move a request to '{}'", payload.status))
    })?;
    let request = state.hire_service.transition(&identity, id, action).await?;
    Ok(Json(ApiResponse::with_message(
        format!("Status updated to {}", request.status),
        HireRequestResponse::from(request),
    )))
}

#[utoipa::path(
    post,
    path = "/api/hire-requests/{id}/cancel",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    responses(
        (status = 200, description = "Request cancelled", body = HireRequestResponse),
        (status = 400, description = "Request already finished"),
        (status = 403, description = "Caller does not own the request")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn cancel_request(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let request = state
        .hire_service
        .transition(&identity, id, HireAction::Cancel)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Request cancelled",
        HireRequestResponse::from(request),
    )))
}

#[utoipa::path(
    post,
    path = "/api/add-message/{id}",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    request_body = AddMessagePayload,
    responses(
        (status = 201, description = "Message appended", body = MessageResponse),
        (status = 400, description = "Empty message"),
        (status = 403, description = "Caller is not a party to the request")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn add_message(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<AddMessagePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let message = state
        .hire_service
        .add_message(&identity, id, &payload.text)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(MessageResponse::from(message))),
    ))
}

#[utoipa::path(
    post,
    path = "/api/hire-requests/{id}/feedback",
    params(("id" = Uuid, Path, description = "Hire request ID")),
    request_body = FeedbackPayload,
    responses(
        (status = 201, description = "Feedback stored and provider rating updated", body = FeedbackResponse),
        (status = 400, description = "Request not completed or already rated"),
        (status = 403, description = "Caller does not own the request")
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<FeedbackPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let (feedback, provider) = state
        .hire_service
        .submit_feedback(&identity, id, payload.rating, payload.comment)
        .await?;
    let body = FeedbackResponse {
        id: feedback.id,
        request_id: feedback.request_id,
        rating: feedback.rating,
        comment: feedback.comment,
        provider_rating_avg: provider.rating_avg,
        provider_rating_count: provider.rating_count,
        created_at: feedback.created_at,
    };
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Thank you for your feedback", body)),
    ))
}

#[utoipa::path(
    get,
    path = "/api/dashboard-stats",
    responses(
        (status = 200, description = "Provider job counters and earnings", body = crate::dto::hire_request_dto::ProviderDashboardStats)
    ),
    security(("bearer_auth" = []))
)]
#[axum::debug_handler]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse> {
    let stats = state.hire_service.dashboard(&identity).await?;
    Ok(Json(ApiResponse::ok(stats)))
}
