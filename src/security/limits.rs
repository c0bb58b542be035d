//! Request body limits.
//!
//! # Design Decisions
//! - Declared `Content-Length` is checked before any byte of the body is read
//! - Bodies without a declared length are buffered here, up to the limit, so
//!   the ceiling holds ahead of rate limiting
//! - Rejections are ordinary `GatewayError`s, so they get the JSON error shape

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::GatewayError;

/// Reject requests whose body exceeds `limit` bytes.
pub async fn enforce_body_limit(State(limit): State<usize>, request: Request, next: Next) -> Response {
    match declared_length(&request) {
        Some(declared) if declared > limit as u64 => {
            tracing::debug!(declared, limit, "Request body over limit");
            GatewayError::PayloadTooLarge { limit }.into_response()
        }
        Some(_) => next.run(request).await,
        None => {
            let (parts, body) = request.into_parts();
            // A body that fails to read for any other reason ends the same way.
            match to_bytes(body, limit).await {
                Ok(bytes) => next.run(Request::from_parts(parts, Body::from(bytes))).await,
                Err(e) => {
                    tracing::debug!(error = %e, limit, "Undeclared request body over limit");
                    GatewayError::PayloadTooLarge { limit }.into_response()
                }
            }
        }
    }
}

fn declared_length(request: &Request) -> Option<u64> {
    request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}
