//! Terminal handlers: not-found responses and error normalization.
//!
//! # Responsibilities
//! - Render the single JSON shape every failure leaves the gateway with
//! - Decide how much diagnostic detail a client may see
//! - Turn panics into ordinary error reports
//!
//! # Design Decisions
//! - Trace text is a separate payload variant, never an optional field
//!   toggled at render time
//! - Outside development, server errors carry a fixed generic message
//! - Client errors (4xx) keep their own message in every environment

use std::any::Any;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::Environment;
use crate::error::{ErrorReport, GatewayError};
use crate::observability::metrics;

/// Error body sent to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    /// Development only: raw message plus diagnostic trace.
    Traced {
        success: bool,
        error: String,
        stack: String,
    },
    /// Every other environment.
    Redacted { success: bool, error: String },
}

impl ErrorPayload {
    pub fn traced(error: impl Into<String>, stack: impl Into<String>) -> Self {
        ErrorPayload::Traced {
            success: false,
            error: error.into(),
            stack: stack.into(),
        }
    }

    pub fn redacted(error: impl Into<String>) -> Self {
        ErrorPayload::Redacted {
            success: false,
            error: error.into(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorPayload::Traced { error, .. } | ErrorPayload::Redacted { error, .. } => error,
        }
    }
}

/// What the normalizer is allowed to reveal.
#[derive(Debug, Clone)]
pub struct ErrorPolicy {
    environment: Environment,
    generic_message: Arc<str>,
}

impl ErrorPolicy {
    pub fn new(environment: Environment, generic_message: impl Into<Arc<str>>) -> Self {
        Self {
            environment,
            generic_message: generic_message.into(),
        }
    }

    pub fn render(&self, report: &ErrorReport) -> ErrorPayload {
        if self.environment.is_development() {
            ErrorPayload::traced(report.message.clone(), report.trace())
        } else if report.status.is_server_error() {
            ErrorPayload::redacted(self.generic_message.as_ref())
        } else {
            ErrorPayload::redacted(report.message.clone())
        }
    }
}

/// Middleware that renders every [`ErrorReport`] produced further down the
/// chain. Responses without a report pass through untouched.
pub async fn normalize_errors(
    State(policy): State<ErrorPolicy>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let response = next.run(request).await;

    let Some(report) = response.extensions().get::<ErrorReport>().cloned() else {
        return response;
    };

    if report.status.is_server_error() {
        tracing::error!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            error = %report.message,
            chain = ?report.chain,
            "Request failed"
        );
    } else {
        tracing::debug!(
            method = %method,
            path = %path,
            status = report.status.as_u16(),
            error = %report.message,
            "Request rejected"
        );
    }
    metrics::record_error(report.status.as_u16());

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(header::CONTENT_LENGTH);
    parts.headers.remove(header::CONTENT_TYPE);
    (parts, Json(policy.render(&report))).into_response()
}

/// 404 body for requests nothing in the chain claimed.
pub fn not_found_response(message: &str) -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorPayload::redacted(message))).into_response()
}

/// Converts a caught panic into an error report for the normalizer.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic payload".to_string()
    };
    GatewayError::Panic(detail).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(status: StatusCode, message: &str) -> ErrorReport {
        ErrorReport {
            status,
            message: message.to_string(),
            chain: vec![format!("Internal({message:?})")],
        }
    }

    #[test]
    fn development_exposes_trace() {
        let policy = ErrorPolicy::new(Environment::Development, "Internal server error");
        let payload = policy.render(&report(StatusCode::INTERNAL_SERVER_ERROR, "db exploded"));

        assert!(matches!(payload, ErrorPayload::Traced { .. }));
        assert_eq!(payload.message(), "db exploded");

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["success"], false);
        assert!(json["stack"].as_str().unwrap().contains("db exploded"));
    }

    #[test]
    fn production_hides_server_error_detail() {
        for environment in [Environment::Production, Environment::Test] {
            let policy = ErrorPolicy::new(environment, "Internal server error");
            let payload = policy.render(&report(StatusCode::INTERNAL_SERVER_ERROR, "db exploded"));

            let json = serde_json::to_value(&payload).unwrap();
            assert_eq!(
                json,
                serde_json::json!({"success": false, "error": "Internal server error"})
            );
        }
    }

    #[test]
    fn production_keeps_client_error_message() {
        let policy = ErrorPolicy::new(Environment::Production, "Internal server error");
        let payload = policy.render(&report(StatusCode::PAYLOAD_TOO_LARGE, "too big"));
        assert_eq!(payload, ErrorPayload::redacted("too big"));
    }

    #[test]
    fn panic_payloads_become_reports() {
        let response = panic_response(Box::new("index out of bounds"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let report = response.extensions().get::<ErrorReport>().unwrap();
        assert!(report.message.contains("index out of bounds"));
    }
}
