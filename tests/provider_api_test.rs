use std::env;
use std::sync::{Arc, Once};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use marketplace_backend::{
    middleware::auth::issue_token,
    models::{provider::NewProvider, user::Role},
    repository::{InMemoryProviderStore, InMemoryRequestStore, ProviderStore},
    services::mail_service::LogMailer,
    AppState,
};
use serde_json::{json, Value as JsonValue};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;
use uuid::Uuid;

const SECRET: &str = "integration_test_secret";

static INIT: Once = Once::new();

fn init_env() {
    INIT.call_once(|| {
        env::set_var("SERVER_ADDRESS", "127.0.0.1:0");
        env::set_var("DATABASE_URL", "postgres://postgres@localhost/marketplace_unused");
        env::set_var("JWT_SECRET", SECRET);
        env::set_var("API_RPS", "10000");
        env::set_var("APP_ENV", "test");
        let _ = marketplace_backend::config::init_config();
    });
}

async fn setup() -> (Router, Arc<InMemoryProviderStore>) {
    init_env();
    let pool = PgPoolOptions::new()
        .connect_lazy("postgres://postgres@localhost/marketplace_unused")
        .expect("lazy pool");
    let providers = Arc::new(InMemoryProviderStore::new());
    let state = AppState::with_stores(
        pool,
        Arc::new(InMemoryRequestStore::new()),
        providers.clone(),
        Arc::new(LogMailer),
        reqwest::Client::new(),
    );
    (marketplace_backend::routes::app(state), providers)
}

async fn call(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<JsonValue>,
) -> (StatusCode, JsonValue) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let req = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null))
}

fn token(user_id: Uuid, role: Role) -> String {
    issue_token(user_id, role, SECRET, 1).expect("token")
}

async fn seed_provider(store: &InMemoryProviderStore, name: &str, services: &[&str]) -> Uuid {
    let id = Uuid::new_v4();
    store
        .create(NewProvider {
            id,
            business_name: name.to_string(),
            phone: Some("555-0199".into()),
            service_types: services.iter().map(|s| s.to_string()).collect(),
        })
        .await
        .expect("seed provider");
    id
}

#[tokio::test]
async fn provider_becomes_public_after_admin_approval() {
    let (app, store) = setup().await;
    let provider_id = seed_provider(&store, "Spark Electric", &["electrical"]).await;
    let admin_token = token(Uuid::new_v4(), Role::Admin);

    let (status, body) = call(&app, Method::GET, "/api/providers", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let uri = format!("/api/admin/providers/{}/approval", provider_id);
    let (status, _) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(&token(provider_id, Role::Provider)),
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = call(
        &app,
        Method::PATCH,
        &uri,
        Some(&admin_token),
        Some(json!({ "status": "approved" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["approval_status"], "approved");

    let (_, body) = call(
        &app,
        Method::GET,
        "/api/providers?service_type=Electrical",
        None,
        None,
    )
    .await;
    assert_eq!(body["data"][0]["id"], provider_id.to_string());

    let (_, body) = call(&app, Method::GET, "/api/providers?service_type=plumbing", None, None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);

    let (status, body) = call(
        &app,
        Method::GET,
        &format!("/api/providers/{}", provider_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["business_name"], "Spark Electric");
    assert!(body["data"]["reviews"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn unapproved_provider_profile_is_hidden() {
    let (app, store) = setup().await;
    let provider_id = seed_provider(&store, "Hidden Co", &["cleaning"]).await;

    let (status, _) = call(
        &app,
        Method::GET,
        &format!("/api/providers/{}", provider_id),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn provider_manages_own_profile() {
    let (app, store) = setup().await;
    let provider_id = seed_provider(&store, "Tidy Homes", &["cleaning"]).await;
    let provider_token = token(provider_id, Role::Provider);

    let (status, body) = call(&app, Method::GET, "/api/providers/me", Some(&provider_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["approval_status"], "pending");

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/providers/me",
        Some(&provider_token),
        Some(json!({
            "bio": "Ten years of spotless homes",
            "service_types": ["Cleaning", " Laundry ", "cleaning"]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["service_types"], json!(["cleaning", "laundry"]));
    assert_eq!(body["data"]["business_name"], "Tidy Homes");

    let (status, _) = call(
        &app,
        Method::PATCH,
        "/api/providers/me",
        Some(&provider_token),
        Some(json!({ "latitude": 10.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        Method::PATCH,
        "/api/providers/me/availability",
        Some(&provider_token),
        Some(json!({ "is_available": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_available"], false);

    let customer_token = token(Uuid::new_v4(), Role::Customer);
    let (status, _) = call(&app, Method::GET, "/api/providers/me", Some(&customer_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
