use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use rust_decimal::Decimal;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        catalog_dto::{
            NewProductFields, ProductQuery, ProductResponse, ShopResponse, UpdateProductPayload,
            UpsertShopPayload,
        },
        response::ApiResponse,
    },
    error::{Error, Result},
    middleware::auth::Identity,
    routes::extract::{ApiJson, ApiPath, ApiQuery},
    utils::upload::{read_form, remove_public_file, FormData, UploadKind},
    AppState,
};

fn product_fields(form: &FormData) -> Result<NewProductFields> {
    let name = form
        .text("name")
        .ok_or_else(|| Error::BadRequest("name is required".into()))?;
    let price: Decimal = form
        .parse("price")?
        .ok_or_else(|| Error::BadRequest("price is required".into()))?;
    Ok(NewProductFields {
        name,
        description: form.text("description"),
        price,
        stock: form.parse("stock")?.unwrap_or(0),
        category: form.text("category"),
        image_url: form.image.as_ref().map(|f| f.url.clone()),
    })
}

fn products_body(items: Vec<crate::models::catalog::Product>) -> Vec<ProductResponse> {
    items.into_iter().map(Into::into).collect()
}

#[axum::debug_handler]
pub async fn upsert_my_shop(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(payload): ApiJson<UpsertShopPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let shop = state.shop_service.upsert_own(identity.user_id, payload).await?;
    Ok(Json(ApiResponse::with_message("Shop saved", ShopResponse::from(shop))))
}

#[axum::debug_handler]
pub async fn my_shop(State(state): State<AppState>, identity: Identity) -> Result<impl IntoResponse> {
    let shop = state.shop_service.get_own(identity.user_id).await?;
    let products = state.shop_service.list_products(shop.id, true).await?;
    Ok(Json(ApiResponse::ok(serde_json::json!({
        "shop": ShopResponse::from(shop),
        "products": products_body(products),
    }))))
}

#[axum::debug_handler]
pub async fn upload_my_shop_image(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = read_form(multipart, UploadKind::Shop, "image").await?;
    let Some(url) = form.image.as_ref().map(|f| f.url.clone()) else {
        return Err(Error::BadRequest("image is required".into()));
    };
    match state.shop_service.set_own_image(identity.user_id, &url).await {
        Ok((shop, previous)) => {
            remove_public_file(previous).await;
            Ok(Json(ApiResponse::with_message("Shop image updated", ShopResponse::from(shop))))
        }
        Err(e) => {
            form.discard_image().await;
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn add_product(
    State(state): State<AppState>,
    identity: Identity,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut form = read_form(multipart, UploadKind::Product, "image").await?;
    let created = match product_fields(&form) {
        Ok(fields) => state.shop_service.add_product(identity.user_id, fields).await,
        Err(e) => Err(e),
    };
    match created {
        Ok(product) => Ok((
            StatusCode::CREATED,
            Json(ApiResponse::with_message("Product added", ProductResponse::from(product))),
        )),
        Err(e) => {
            form.discard_image().await;
            Err(e)
        }
    }
}

#[axum::debug_handler]
pub async fn update_product(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(payload): ApiJson<UpdateProductPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let product = state
        .shop_service
        .update_product(identity.user_id, id, payload)
        .await?;
    Ok(Json(ApiResponse::ok(ProductResponse::from(product))))
}

#[axum::debug_handler]
pub async fn delete_product(
    State(state): State<AppState>,
    identity: Identity,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let image = state.shop_service.delete_product(identity.user_id, id).await?;
    remove_public_file(image).await;
    Ok(Json(ApiResponse::message("Product deleted")))
}

#[axum::debug_handler]
pub async fn list_shops(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let shops = state.shop_service.list_public().await?;
    let body: Vec<ShopResponse> = shops.into_iter().map(Into::into).collect();
    Ok(Json(ApiResponse::ok(body)))
}

#[axum::debug_handler]
pub async fn get_shop(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let shop = state.shop_service.get_public(id).await?;
    Ok(Json(ApiResponse::ok(ShopResponse::from(shop))))
}

#[axum::debug_handler]
pub async fn shop_products(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let shop = state.shop_service.get_public(id).await?;
    let products = state.shop_service.list_products(shop.id, false).await?;
    Ok(Json(ApiResponse::ok(products_body(products))))
}

#[axum::debug_handler]
pub async fn search_products(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ProductQuery>,
) -> Result<impl IntoResponse> {
    let products = state.shop_service.search_products(&query).await?;
    Ok(Json(ApiResponse::ok(products_body(products))))
}
