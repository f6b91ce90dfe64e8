use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        admin_dto::{UserListQuery, UserStatusPayload},
        auth_dto::UserResponse,
        provider_dto::{ApprovalPayload, ProviderResponse},
        response::ApiResponse,
        support_dto::{TicketQuery, TicketResponse, UpdateTicketPayload},
    },
    error::Result,
    middleware::auth::Identity,
    routes::extract::{ApiJson, ApiPath, ApiQuery},
    AppState,
};

#[axum::debug_handler]
pub async fn list_tickets(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<TicketQuery>,
) -> Result<impl IntoResponse> {
    let tickets = state
        .support_service
        .list_all(query.status.as_deref().filter(|s| !s.trim().is_empty()))
        .await?;
    let body: Vec<TicketResponse> = tickets.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[axum::debug_handler]
pub async fn update_ticket(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateTicketPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let ticket = state.support_service.update(id, payload).await?;
    Ok(Json(ApiResponse::ok(TicketResponse::from(ticket))))
}

#[axum::debug_handler]
pub async fn list_users(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> Result<impl IntoResponse> {
    let users = state.admin_service.list_users(query.role.as_deref()).await?;
    let body: Vec<UserResponse> = users.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[axum::debug_handler]
pub async fn set_user_status(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UserStatusPayload>,
) -> Result<impl IntoResponse> {
    let user = state
        .admin_service
        .set_user_active(identity.user_id, id, payload.is_active)
        .await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user))))
}

#[axum::debug_handler]
pub async fn set_provider_approval(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<ApprovalPayload>,
) -> Result<impl IntoResponse> {
    let provider = state
        .provider_service
        .set_approval(id, payload.status)
        .await?;
    Ok(Json(ApiResponse::with_message(
        format!("Provider {}", payload.status.as_str()),
        ProviderResponse::from(provider),
    )))
}

#[axum::debug_handler]
pub async fn dashboard_stats(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let stats = state.admin_service.dashboard().await?;
    Ok(Json(ApiResponse::ok(stats)))
}
