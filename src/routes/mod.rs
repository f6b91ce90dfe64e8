pub mod admin;
pub mod auth;
pub mod catalog;
pub mod docs;
pub mod extract;
pub mod health;
pub mod hire_requests;
pub mod providers;
pub mod shops;
pub mod support;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post, put},
    Router,
};

use crate::config::get_config;
use crate::middleware::{
    auth::{require_admin, require_auth, require_customer, require_provider, require_shop_owner},
    rate_limit::{new_rps_state, rps_middleware},
};
use crate::AppState;

/// API router without the process-level layers (CORS, tracing, static files)
/// that `main` adds.
pub fn app(state: AppState) -> Router {
    let config = get_config();

    let public_api = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/google", post(auth::google_login))
        .route("/api/auth/forgot-password", post(auth::forgot_password))
        .route("/api/auth/reset-password", post(auth::reset_password))
        .route("/api/providers", get(providers::list_providers))
        .route("/api/providers/:id", get(providers::get_provider))
        .route("/api/services", get(catalog::list_services))
        .route("/api/shops", get(shops::list_shops))
        .route("/api/shops/:id", get(shops::get_shop))
        .route("/api/shops/:id/products", get(shops::shop_products))
        .route("/api/products", get(shops::search_products));

    let customer_api = Router::new()
        .route("/api/hire-requests", post(hire_requests::create_hire_request))
        .route("/api/my-hire-requests", get(hire_requests::my_hire_requests))
        .route(
            "/api/hire-requests/:id/cancel",
            post(hire_requests::cancel_request),
        )
        .route(
            "/api/hire-requests/:id/feedback",
            post(hire_requests::submit_feedback),
        )
        .route_layer(from_fn(require_customer));

    let provider_api = Router::new()
        .route(
            "/api/available-requests",
            get(hire_requests::available_requests),
        )
        .route("/api/accept-request/:id", post(hire_requests::accept_request))
        .route(
            "/api/decline-request/:id",
            post(hire_requests::decline_request),
        )
        .route("/api/my-jobs", get(hire_requests::my_jobs))
        .route("/api/dashboard-stats", get(hire_requests::dashboard_stats))
        .route(
            "/api/providers/me",
            get(providers::my_profile).patch(providers::update_my_profile),
        )
        .route(
            "/api/providers/me/availability",
            patch(providers::set_my_availability),
        )
        .route_layer(from_fn(require_provider));

    let member_api = Router::new()
        .route("/api/auth/me", get(auth::me))
        .route("/api/hire-requests/:id", get(hire_requests::get_hire_request))
        .route(
            "/api/update-job-status/:id",
            patch(hire_requests::update_job_status),
        )
        .route("/api/add-message/:id", post(hire_requests::add_message))
        .route("/api/support/tickets", post(support::create_ticket))
        .route("/api/support/tickets/mine", get(support::my_tickets))
        .route_layer(from_fn(require_auth));

    let shop_api = Router::new()
        .route(
            "/api/shops/mine",
            put(shops::upsert_my_shop).get(shops::my_shop),
        )
        .route("/api/shops/mine/image", post(shops::upload_my_shop_image))
        .route("/api/shops/mine/products", post(shops::add_product))
        .route(
            "/api/shops/mine/products/:id",
            patch(shops::update_product).delete(shops::delete_product),
        )
        .route_layer(from_fn(require_shop_owner));

    let admin_api = Router::new()
        .route("/api/admin/services", post(catalog::create_service))
        .route(
            "/api/admin/services/:id",
            patch(catalog::update_service).delete(catalog::delete_service),
        )
        .route("/api/admin/tickets", get(admin::list_tickets))
        .route("/api/admin/tickets/:id", patch(admin::update_ticket))
        .route("/api/admin/users", get(admin::list_users))
        .route("/api/admin/users/:id/status", patch(admin::set_user_status))
        .route(
            "/api/admin/providers/:id/approval",
            patch(admin::set_provider_approval),
        )
        .route("/api/admin/dashboard-stats", get(admin::dashboard_stats))
        .route_layer(from_fn(require_admin));

    let api = public_api
        .merge(customer_api)
        .merge(provider_api)
        .merge(member_api)
        .merge(shop_api)
        .merge(admin_api)
        .layer(from_fn_with_state(
            new_rps_state(config.api_rps),
            rps_middleware,
        ));

    Router::new()
        .route("/health", get(health::health))
        .route("/api/openapi.json", get(docs::openapi_json))
        .merge(api)
        .with_state(state)
}
