use axum::http::{header, Method};
use tower_http::cors::{Any, CorsLayer};

/// Bearer tokens travel in headers, so any origin may call the API.
pub fn api_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_origin(Any)
}
