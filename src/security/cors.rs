//! Cross-origin policy.
//!
//! Wrapper around tower-http CORS with gateway configuration. The policy is
//! declarative: a disallowed origin gets no matching allow-origin header and
//! the browser refuses the response; nothing is rejected server-side.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

pub const ALLOWED_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::OPTIONS,
];

/// Create CORS layer from gateway config.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(ALLOWED_METHODS)
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    match HeaderValue::from_str(&config.origin) {
        // Echoed only when the request's origin matches.
        Ok(origin) => layer.allow_origin(AllowOrigin::list([origin])),
        Err(_) => {
            tracing::warn!(origin = %config.origin, "Invalid CORS origin, using restrictive policy");
            layer
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn allow_origin_for(origin: &str) -> Option<HeaderValue> {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(create_cors_layer(&CorsConfig {
                origin: "https://app.example.com".into(),
            }));
        let request = Request::builder()
            .uri("/")
            .header(header::ORIGIN, origin)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .cloned()
    }

    #[tokio::test]
    async fn configured_origin_is_echoed() {
        assert_eq!(
            allow_origin_for("https://app.example.com").await.unwrap(),
            "https://app.example.com"
        );
    }

    #[tokio::test]
    async fn other_origins_get_nothing() {
        assert!(allow_origin_for("https://other.example.com").await.is_none());
    }
}
