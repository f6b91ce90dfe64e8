use std::env;
use std::sync::{Arc, Once};

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use marketplace_backend::{
    middleware::auth::issue_token,
    models::{
        provider::{ApprovalStatus, NewProvider},
        user::Role,
    },
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

struct TestApp {
    router: Router,
    providers: Arc<InMemoryProviderStore>,
}

impl TestApp {
    async fn new() -> Self {
        init_env();
        // Never connected: hire-request and provider paths run on the in-memory stores.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://postgres@localhost/marketplace_unused")
            .expect("lazy pool");
        let requests = Arc::new(InMemoryRequestStore::new());
        let providers = Arc::new(InMemoryProviderStore::new());
        let state = AppState::with_stores(
            pool,
            requests,
            providers.clone(),
            Arc::new(LogMailer),
            reqwest::Client::new(),
        );
        Self {
            router: marketplace_backend::routes::app(state),
            providers,
        }
    }

    async fn provider(&self, name: &str, services: &[&str], approved: bool) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.providers
            .create(NewProvider {
                id,
                business_name: name.to_string(),
                phone: None,
                service_types: services.iter().map(|s| s.to_string()).collect(),
            })
            .await
            .expect("seed provider");
        if approved {
            self.providers
                .set_approval(id, ApprovalStatus::Approved)
                .await
                .expect("approve provider");
        }
        (id, token(id, Role::Provider))
    }

    async fn send(
        &self,
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
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(JsonValue::Null);
        (status, json)
    }
}

fn token(user_id: Uuid, role: Role) -> String {
    issue_token(user_id, role, SECRET, 1).expect("token")
}

fn customer() -> (Uuid, String) {
    let id = Uuid::new_v4();
    (id, token(id, Role::Customer))
}

fn hire_payload(service_type: &str, provider_id: Option<Uuid>) -> JsonValue {
    json!({
        "provider_id": provider_id,
        "name": "Dana Client",
        "email": "dana@example.com",
        "contact_number": "555-0100",
        "address": "12 Elm Street",
        "service_type": service_type,
        "description": "Kitchen sink is leaking",
        "preferred_date": "2026-11-02",
        "preferred_time": "morning",
        "latitude": 51.5074,
        "longitude": -0.1278
    })
}

async fn create_request(app: &TestApp, customer_token: &str, payload: JsonValue) -> String {
    let (status, body) = app
        .send(Method::POST, "/api/hire-requests", Some(customer_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    body["data"]["id"].as_str().unwrap().to_string()
}

fn ids(body: &JsonValue) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn request_lifecycle_end_to_end() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (provider_a, token_a) = app.provider("Ace Plumbing", &["plumbing"], true).await;
    let (_, token_b) = app.provider("Best Plumbing", &["plumbing"], true).await;

    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;

    let (status, body) = app
        .send(Method::GET, "/api/available-requests", Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).contains(&id));

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/accept-request/{}", id),
            Some(&token_a),
            Some(json!({ "price": "120.50" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "confirmed");
    assert_eq!(body["data"]["provider_id"], provider_a.to_string());
    assert_eq!(body["data"]["price"], "120.50");
    assert!(body["data"]["accepted_at"].is_string());

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&token_a),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "in-progress");
    assert!(body["data"]["started_at"].is_string());

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&token_b),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&token_a),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "completed");
    assert!(body["data"]["completed_at"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            &format!("/api/hire-requests/{}/feedback", id),
            Some(&customer_token),
            Some(json!({ "rating": 5, "comment": "Fast and tidy" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["provider_rating_count"], 1);
    assert_eq!(body["data"]["provider_rating_avg"].as_f64(), Some(5.0));

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/hire-requests/{}/feedback", id),
            Some(&customer_token),
            Some(json!({ "rating": 1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(Method::GET, "/api/dashboard-stats", Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["jobs_by_status"]["completed"], 1);
    assert_eq!(body["data"]["total_earnings"], "120.50");
    assert_eq!(body["data"]["rating_count"], 1);
}

#[tokio::test]
async fn completed_requires_in_progress() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace", &["cleaning"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("cleaning", None)).await;

    let (status, _) = app
        .send(Method::POST, &format!("/api/accept-request/{}", id), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&token_a),
            Some(json!({ "status": "completed" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn declined_request_never_resurfaces_for_that_provider() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace", &["plumbing"], true).await;
    let (_, token_b) = app.provider("Best", &["plumbing"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;

    let (status, body) = app
        .send(Method::POST, &format!("/api/decline-request/{}", id), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "pending");

    let (_, body) = app
        .send(Method::GET, "/api/available-requests", Some(&token_a), None)
        .await;
    assert!(!ids(&body).contains(&id));

    let (_, body) = app
        .send(Method::GET, "/api/available-requests", Some(&token_b), None)
        .await;
    assert!(ids(&body).contains(&id));

    let (status, _) = app
        .send(Method::POST, &format!("/api/accept-request/{}", id), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn concurrent_accepts_have_one_winner() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace", &["moving"], true).await;
    let (_, token_b) = app.provider("Best", &["moving"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("moving", None)).await;
    let uri = format!("/api/accept-request/{}", id);

    let ((status_a, _), (status_b, _)) = tokio::join!(
        app.send(Method::POST, &uri, Some(&token_a), None),
        app.send(Method::POST, &uri, Some(&token_b), None),
    );
    let mut statuses = vec![status_a.as_u16(), status_b.as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![200, 400]);
}

#[tokio::test]
async fn only_the_owning_customer_can_cancel() {
    let app = TestApp::new().await;
    let (_, owner_token) = customer();
    let (_, stranger_token) = customer();
    let id = create_request(&app, &owner_token, hire_payload("painting", None)).await;

    let (status, _) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&owner_token),
            Some(json!({ "status": "in-progress" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let cancel = format!("/api/hire-requests/{}/cancel", id);
    let (status, _) = app
        .send(Method::POST, &cancel, Some(&stranger_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(Method::POST, &cancel, Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "cancelled");
    assert!(body["data"]["cancelled_at"].is_string());

    let (status, _) = app.send(Method::POST, &cancel, Some(&owner_token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn direct_hire_is_reserved_for_the_addressed_provider() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace", &["electrical"], true).await;
    let (provider_b, token_b) = app.provider("Best", &["electrical"], true).await;
    let id = create_request(
        &app,
        &customer_token,
        hire_payload("electrical", Some(provider_b)),
    )
    .await;

    let (_, body) = app
        .send(Method::GET, "/api/available-requests", Some(&token_a), None)
        .await;
    assert!(!ids(&body).contains(&id));

    let (status, _) = app
        .send(Method::POST, &format!("/api/accept-request/{}", id), Some(&token_a), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::POST, &format!("/api/decline-request/{}", id), Some(&token_b), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "declined");
}

#[tokio::test]
async fn message_thread_is_limited_to_the_parties() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace Plumbing", &["plumbing"], true).await;
    let (_, token_b) = app.provider("Best", &["plumbing"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;
    let uri = format!("/api/add-message/{}", id);

    let (status, _) = app
        .send(Method::POST, &uri, Some(&customer_token), Some(json!({ "text": "" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            Some(&customer_token),
            Some(json!({ "text": "Gate code is 1234" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["sender_role"], "customer");

    app.send(Method::POST, &format!("/api/accept-request/{}", id), Some(&token_a), None)
        .await;

    let (status, body) = app
        .send(Method::POST, &uri, Some(&token_a), Some(json!({ "text": "On my way" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["name"], "Ace Plumbing");

    let (status, _) = app
        .send(Method::POST, &uri, Some(&token_b), Some(json!({ "text": "Hello?" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .send(Method::GET, &format!("/api/hire-requests/{}", id), Some(&customer_token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = body["data"]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["Gate code is 1234", "On my way"]);
}

#[tokio::test]
async fn unapproved_provider_cannot_accept() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, pending_token) = app.provider("Newbie", &["plumbing"], false).await;
    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;

    let (status, _) = app
        .send(
            Method::POST,
            &format!("/api/accept-request/{}", id),
            Some(&pending_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn role_gates_and_missing_tokens() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, provider_token) = app.provider("Ace", &["plumbing"], true).await;

    let (status, body) = app
        .send(Method::GET, "/api/available-requests", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = app
        .send(Method::GET, "/api/available-requests", Some(&customer_token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            Method::POST,
            "/api/hire-requests",
            Some(&provider_token),
            Some(hire_payload("plumbing", None)),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(Method::GET, "/api/my-hire-requests", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn invalid_payload_is_rejected() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let mut payload = hire_payload("plumbing", None);
    payload["email"] = json!("not-an-email");

    let (status, body) = app
        .send(Method::POST, "/api/hire-requests", Some(&customer_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let mut payload = hire_payload("plumbing", None);
    payload["preferred_date"] = json!("next tuesday");
    let (status, _) = app
        .send(Method::POST, "/api/hire-requests", Some(&customer_token), Some(payload))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_input_gets_400_in_the_error_envelope() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, provider_token) = app.provider("Ace Plumbing", &["plumbing"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/api/update-job-status/{}", id),
            Some(&provider_token),
            Some(json!({ "status": "archived" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = app
        .send(
            Method::POST,
            "/api/hire-requests",
            Some(&customer_token),
            Some(json!({ "name": "x" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .send(Method::GET, "/api/hire-requests/not-a-uuid", Some(&customer_token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, body) = app
        .send(
            Method::GET,
            "/api/available-requests?latitude=north",
            Some(&provider_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn accept_with_unreadable_price_is_rejected() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, provider_token) = app.provider("Ace Plumbing", &["plumbing"], true).await;
    let id = create_request(&app, &customer_token, hire_payload("plumbing", None)).await;
    let uri = format!("/api/accept-request/{}", id);

    let (status, body) = app
        .send(
            Method::POST,
            &uri,
            Some(&provider_token),
            Some(json!({ "price": "not-a-number" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{}", body);
    assert_eq!(body["success"], false);

    let (_, body) = app
        .send(Method::GET, &format!("/api/hire-requests/{}", id), Some(&customer_token), None)
        .await;
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = app.send(Method::POST, &uri, Some(&provider_token), None).await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "confirmed");
    assert!(body["data"]["price"].is_null());
}

#[tokio::test]
async fn available_requests_sorted_by_distance() {
    let app = TestApp::new().await;
    let (_, customer_token) = customer();
    let (_, token_a) = app.provider("Ace", &["gardening"], true).await;

    let mut far = hire_payload("gardening", None);
    far["latitude"] = json!(48.8566);
    far["longitude"] = json!(2.3522);
    let far_id = create_request(&app, &customer_token, far).await;
    let near_id = create_request(&app, &customer_token, hire_payload("gardening", None)).await;

    let (status, body) = app
        .send(
            Method::GET,
            "/api/available-requests?latitude=51.5&longitude=-0.12&service_type=gardening",
            Some(&token_a),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![near_id.clone(), far_id]);
    assert!(body["data"][0]["distance_km"].as_f64().unwrap() < 5.0);

    let (_, body) = app
        .send(
            Method::GET,
            "/api/available-requests?latitude=51.5&longitude=-0.12&max_distance_km=50",
            Some(&token_a),
            None,
        )
        .await;
    assert_eq!(ids(&body), vec![near_id]);
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = TestApp::new().await;
    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, body) = app.send(Method::GET, "/api/openapi.json", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/api/accept-request/{id}"].is_object());
}
