use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use validator::Validate;

use crate::{
    dto::{
        auth_dto::{
            AuthResponse, ForgotPasswordPayload, GoogleLoginPayload, LoginPayload,
            RegisterPayload, ResetPasswordPayload, UserResponse,
        },
        response::ApiResponse,
    },
    error::Result,
    middleware::auth::Identity,
    models::user::User,
    routes::extract::ApiJson,
    AppState,
};

fn auth_response(state: &AppState, user: User) -> Result<AuthResponse> {
    let token = state.auth_service.token_for(&user)?;
    Ok(AuthResponse {
        token,
        user: user.into(),
    })
}

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<RegisterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.auth_service.register(payload).await?;
    let body = auth_response(&state, user)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::with_message("Account created", body)),
    ))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.auth_service.login(payload).await?;
    Ok(Json(ApiResponse::ok(auth_response(&state, user)?)))
}

#[axum::debug_handler]
pub async fn google_login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<GoogleLoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let user = state.auth_service.google_login(payload).await?;
    Ok(Json(ApiResponse::ok(auth_response(&state, user)?)))
}

#[axum::debug_handler]
pub async fn me(State(state): State<AppState>, identity: Identity) -> Result<impl IntoResponse> {
    let user = state.auth_service.get_user(identity.user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(user))))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ForgotPasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state.auth_service.forgot_password(&payload.email).await?;
    Ok(Json(ApiResponse::message(
        "If that email is registered, a reset link has been sent",
    )))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<ResetPasswordPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    state
        .auth_service
        .reset_password(&payload.token, &payload.password)
        .await?;
    Ok(Json(ApiResponse::message("Password has been reset")))
}
