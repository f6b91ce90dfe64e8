use axum::{
    async_trait,
    extract::{FromRequestParts, Request},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
    pub role: Option<String>,
}

/// Authenticated caller, resolved once per request from the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub role: Role,
}

impl Identity {
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    MissingAuthorization,
    BadAuthorization,
    UnsupportedScheme,
    InvalidToken,
    Forbidden,
}

impl AuthRejection {
    fn code(&self) -> &'static str {
        match self {
            AuthRejection::MissingAuthorization => "missing_authorization",
            AuthRejection::BadAuthorization => "bad_authorization",
            AuthRejection::UnsupportedScheme => "unsupported_scheme",
            AuthRejection::InvalidToken => "invalid_token",
            AuthRejection::Forbidden => "forbidden",
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let status = match self {
            AuthRejection::Forbidden => StatusCode::FORBIDDEN,
            _ => StatusCode::UNAUTHORIZED,
        };
        (status, Json(json!({ "success": false, "error": self.code() }))).into_response()
    }
}

pub fn issue_token(user_id: Uuid, role: Role, secret: &str, ttl_hours: i64) -> Result<String> {
    let exp = (Utc::now() + chrono::Duration::hours(ttl_hours.max(1))).timestamp() as usize;
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
        role: Some(role.as_str().to_string()),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::Internal(format!("Failed to sign token: {}", e)))
}

pub fn decode_token(token: &str, secret: &str) -> std::result::Result<Identity, AuthRejection> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AuthRejection::InvalidToken)?;

    let user_id = Uuid::parse_str(&data.claims.sub).map_err(|_| AuthRejection::InvalidToken)?;
    let role = data
        .claims
        .role
        .as_deref()
        .and_then(Role::parse)
        .ok_or(AuthRejection::InvalidToken)?;
    Ok(Identity { user_id, role })
}

pub fn resolve_identity(headers: &HeaderMap) -> std::result::Result<Identity, AuthRejection> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or(AuthRejection::MissingAuthorization)?;
    let auth_str = auth_header
        .to_str()
        .map_err(|_| AuthRejection::BadAuthorization)?;
    let token = auth_str
        .strip_prefix("Bearer ")
        .ok_or(AuthRejection::UnsupportedScheme)?;

    let config = crate::config::get_config();
    decode_token(token.trim(), &config.jwt_secret)
}

pub async fn require_auth(req: Request, next: Next) -> Response {
    require_roles(req, next, &[]).await
}

/// Resolves the caller and, when `allowed` is non-empty, checks their role.
pub async fn require_roles(mut req: Request, next: Next, allowed: &[Role]) -> Response {
    match resolve_identity(req.headers()) {
        Ok(identity) => {
            if !allowed.is_empty() && !allowed.contains(&identity.role) {
                return AuthRejection::Forbidden.into_response();
            }
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(rejection) => rejection.into_response(),
    }
}

pub async fn require_admin(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Admin]).await
}

pub async fn require_provider(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Provider]).await
}

pub async fn require_customer(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::Customer]).await
}

pub async fn require_shop_owner(req: Request, next: Next) -> Response {
    require_roles(req, next, &[Role::ShopOwner]).await
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(*identity);
        }
        resolve_identity(&parts.headers)
    }
}
