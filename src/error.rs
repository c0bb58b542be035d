//! Request-path error type.
//!
//! Handlers and middleware never render error bodies themselves. A
//! [`GatewayError`] turns into a bare status response carrying an
//! [`ErrorReport`] in its extensions; the error normalizer stage
//! (`http::response::normalize_errors`) is the only place that decides what
//! the client gets to see.

use std::error::Error as StdError;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors raised anywhere in the request pipeline.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// An error that carries its own HTTP status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// Declared request body is larger than the configured ceiling.
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// The persistence backend could not be reached for this invocation.
    #[error("persistence backend unavailable: {0}")]
    DependencyUnavailable(String),

    /// A handler panicked while producing a response.
    #[error("handler panicked: {0}")]
    Panic(String),

    /// Any other application failure.
    #[error(transparent)]
    Internal(#[from] Box<dyn StdError + Send + Sync>),
}

impl GatewayError {
    /// Error with an explicit status and client-facing message.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Wrap an arbitrary application error as a 500.
    pub fn internal<E>(error: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        Self::Internal(Box::new(error))
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Status { status, .. } => *status,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::DependencyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Panic(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let report = ErrorReport::from_error(&self);
        let mut response = report.status.into_response();
        response.extensions_mut().insert(report);
        response
    }
}

/// Everything the normalizer needs to render an error, detached from the
/// original error value so it can travel in response extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub status: StatusCode,
    pub message: String,
    /// Display text of the error followed by each `source()` in order.
    pub chain: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(error: &GatewayError) -> Self {
        let mut chain = vec![format!("{error:?}")];
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }

        Self {
            status: error.status(),
            message: error.to_string(),
            chain,
        }
    }

    /// Multi-line diagnostic trace, only ever exposed in development.
    pub fn trace(&self) -> String {
        let mut lines = self.chain.iter();
        let mut trace = format!("Error: {}", self.message);
        if let Some(head) = lines.next() {
            trace.push_str("\n    at ");
            trace.push_str(head);
        }
        for cause in lines {
            trace.push_str("\n    caused by: ");
            trace.push_str(cause);
        }
        trace
    }
}
