use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::{
        response::ApiResponse,
        support_dto::{CreateTicketPayload, TicketResponse},
    },
    error::Result,
    middleware::auth::Identity,
    routes::extract::ApiJson,
    AppState,
};

#[axum::debug_handler]
pub async fn create_ticket(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<CreateTicketPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let ticket = state
        .support_service
        .create(identity.user_id, payload)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message(
            "Ticket submitted",
            TicketResponse::from(ticket),
        )),
    ))
}

#[axum::debug_handler]
pub async fn my_tickets(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse> {
    let tickets = state.support_service.list_for_user(identity.user_id).await?;
    let body: Vec<TicketResponse> = tickets.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}
