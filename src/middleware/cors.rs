use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{Any, CorsLayer};

/// Allows the configured frontend origin; falls back to any origin when it
/// cannot be parsed as a header value.
pub fn frontend_cors(frontend_url: &str) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    let headers = [header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT];

    match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_origin(origin),
        Err(_) => CorsLayer::new()
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_origin(Any),
    }
}
