use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use uuid::Uuid;

use crate::{
    dto::{
        catalog_dto::{CategoryFields, ServiceCategoryResponse},
        response::ApiResponse,
    },
    error::Result,
    routes::extract::ApiPath,
    utils::upload::{read_form, remove_public_file, FormData, UploadKind},
    AppState,
};

fn category_fields(form: &FormData) -> Result<CategoryFields> {
    Ok(CategoryFields {
        name: form.text("name"),
        description: form.text("description"),
        is_active: form.parse("is_active")?,
        image_url: form.image.as_ref().map(|f| f.url.clone()),
    })
}

#[axum::debug_handler]
pub async fn list_services(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let items = state.catalog_service.list(false).await?;
    let body: Vec<ServiceCategoryResponse> = items.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[axum::debug_handler]
pub async fn create_service(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = read_form(multipart, UploadKind::Service, "image").await?;
    let created = match category_fields(&form) {
        Ok(fields) => state.catalog_service.create(fields).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(category) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message(
                "Service category created",
                ServiceCategoryResponse::from(category),
            )),
        )),
        Err(e) => {
            form.discard_image().await;
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn update_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = read_form(multipart, UploadKind::Service, "image").await?;
    let updated = match category_fields(&form) {
        Ok(fields) => state.catalog_service.update(id, fields).await,
        Err(e) => Err(e),
    };
    match updated {
        Ok((category, replaced)) => {
            remove_public_file(replaced).await;
            Ok(Json(ApiResponse::with_message(
                "Service category updated",
                ServiceCategoryResponse::from(category),
            )))
        }
        Err(e) => {
            form.discard_image().await;
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn delete_service(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let image = state.catalog_service.delete(id).await?;
    remove_public_file(image).await;
    Ok(Json(ApiResponse::message("Service category deleted")))
}
