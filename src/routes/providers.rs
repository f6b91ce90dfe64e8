use axum::{
    extract::State,
    response::{IntoResponse, Json},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        provider_dto::{
            AvailabilityPayload, ProviderDetailResponse, ProviderQuery, ProviderResponse,
            UpdateProviderPayload,
        },
        response::ApiResponse,
    },
    error::Result,
    middleware::auth::Identity,
    routes::extract::{ApiJson, ApiPath, ApiQuery},
    AppState,
};

#[axum::debug_handler]
pub async fn list_providers(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProviderQuery>,
) -> Result<impl IntoResponse> {
    let items = state.provider_service.list_public(&query).await?;
    let body: Vec<ProviderResponse> = items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[axum::debug_handler]
pub async fn get_provider(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let (provider, reviews) = state.provider_service.get_public(id).await?;
    Ok(Json(ApiResponse::ok(ProviderDetailResponse {
        provider: provider.into(),
        reviews: reviews.into_iter().map(Into::into).collect(),
    })))
}

#[axum::debug_handler]
pub async fn my_profile(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse> {
    let provider = state.provider_service.get_own(identity.user_id).await?;
    Ok(Json(ApiResponse::ok(ProviderResponse::from(provider))))
}

#[axum::debug_handler]
pub async fn update_my_profile(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<UpdateProviderPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let provider = state
        .provider_service
        .update_own(identity.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::with_message(
        "Profile updated",
        ProviderResponse::from(provider),
    )))
}

#[axum::debug_handler]
pub async fn set_my_availability(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<AvailabilityPayload>,
) -> Result<impl IntoResponse> {
    let provider = state
        .provider_service
        .set_availability(identity.user_id, payload.is_available)
        .await?;
    Ok(Json(ApiResponse::ok(ProviderResponse::from(provider))))
}
