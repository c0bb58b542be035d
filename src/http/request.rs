//! Request-side helpers.
//!
//! # Responsibilities
//! - Generate unique request IDs
//! - Resolve the client identity used for rate limiting
//! - Parse JSON and URL-encoded bodies for delegated handlers
//! - Carry per-request markers set by the lifecycle layer

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, FromRequest, Request},
    http::{header, HeaderValue},
    Form, Json,
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::error::GatewayError;

/// Forwarded client header consulted for identity.
pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// UUID v4 request IDs for `x-request-id`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeGatewayRequestId;

impl MakeRequestId for MakeGatewayRequestId {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Who is making the request, for per-client accounting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    /// Resolve the identity of the request's originator.
    ///
    /// The peer address wins unless forwarded headers are trusted. Without a
    /// peer address (hosted invocations) the forwarded header is the only
    /// identity available, so it is used either way.
    pub fn resolve(request: &Request, trust_forwarded_for: bool) -> Self {
        let peer = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string());
        let forwarded = || {
            request
                .headers()
                .get(X_FORWARDED_FOR)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let identity = if trust_forwarded_for {
            forwarded().or(peer)
        } else {
            peer.or_else(forwarded)
        };
        Self(identity.unwrap_or_else(|| "unknown".to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Marker attached by the hosted gateway when the persistence backend could
/// not be reached for the current invocation.
#[derive(Debug, Clone)]
pub struct DependencyFault(pub Arc<str>);

/// A request body decoded according to its content type.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
    /// Any other content type; the body is left unread.
    Unparsed,
}

impl<S> FromRequest<S> for ParsedBody
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(value) = Json::<serde_json::Value>::from_request(req, state)
                .await
                .map_err(|rejection| GatewayError::new(rejection.status(), rejection.body_text()))?;
            Ok(ParsedBody::Json(value))
        } else if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(fields) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|rejection| GatewayError::new(rejection.status(), rejection.body_text()))?;
            Ok(ParsedBody::Form(fields))
        } else {
            Ok(ParsedBody::Unparsed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::StatusCode;

    fn request_with(forwarded: Option<&str>, peer: Option<&str>) -> Request {
        let mut builder = axum::http::Request::builder().uri("/api/items");
        if let Some(value) = forwarded {
            builder = builder.header(X_FORWARDED_FOR, value);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(addr) = peer {
            request
                .extensions_mut()
                .insert(ConnectInfo(addr.parse::<SocketAddr>().unwrap()));
        }
        request
    }

    #[test]
    fn peer_address_wins_when_forwarding_untrusted() {
        let req = request_with(Some("203.0.113.9"), Some("10.0.0.2:5555"));
        assert_eq!(ClientIdentity::resolve(&req, false).as_str(), "10.0.0.2");
    }

    #[test]
    fn forwarded_header_wins_when_trusted() {
        let req = request_with(Some("203.0.113.9, 10.0.0.1"), Some("10.0.0.2:5555"));
        assert_eq!(ClientIdentity::resolve(&req, true).as_str(), "203.0.113.9");
    }

    #[test]
    fn forwarded_header_used_without_peer() {
        let req = request_with(Some("198.51.100.4"), None);
        assert_eq!(ClientIdentity::resolve(&req, false).as_str(), "198.51.100.4");

        let req = request_with(None, None);
        assert_eq!(ClientIdentity::resolve(&req, false).as_str(), "unknown");
    }

    fn body_request(content_type: &str, body: &str) -> Request {
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/echo")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn parses_json_and_forms() {
        let parsed = ParsedBody::from_request(body_request("application/json", r#"{"a":1}"#), &())
            .await
            .unwrap();
        assert_eq!(parsed, ParsedBody::Json(serde_json::json!({"a": 1})));

        let parsed = ParsedBody::from_request(
            body_request("application/x-www-form-urlencoded", "name=ada&lang=en"),
            &(),
        )
        .await
        .unwrap();
        assert_eq!(
            parsed,
            ParsedBody::Form(vec![
                ("name".to_string(), "ada".to_string()),
                ("lang".to_string(), "en".to_string()),
            ])
        );

        let parsed = ParsedBody::from_request(body_request("text/plain", "hello"), &())
            .await
            .unwrap();
        assert_eq!(parsed, ParsedBody::Unparsed);
    }

    #[tokio::test]
    async fn malformed_json_is_a_client_error() {
        let err = ParsedBody::from_request(body_request("application/json", "{not json"), &())
            .await
            .unwrap_err();
        assert!(err.status().is_client_error());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
